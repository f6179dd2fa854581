//! LLM error types.

use thiserror::Error;

/// Convert a non-success HTTP response into an [`LLMError`].
///
/// 429 responses become `RateLimit` with the `retry-after` hint preserved;
/// everything else becomes `Api`. The body is kept verbatim because some
/// providers only signal quota exhaustion inside it. An empty body is
/// replaced by the status line.
pub async fn error_from_response(response: reqwest::Response) -> LLMError {
    let status_line = response.status().to_string();
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        format!("HTTP {status_line}")
    } else {
        body
    };

    if status == 429 {
        LLMError::RateLimit {
            retry_after,
            message,
        }
    } else {
        LLMError::Api { status, message }
    }
}

/// Errors that can occur when making LLM API calls.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request failed
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited (429)
    #[error("rate limited (status 429, retry after {retry_after:?}s): {message}")]
    RateLimit {
        retry_after: Option<u64>,
        message: String,
    },

    /// The provider answered but produced no text (blocked, filtered, or empty)
    #[error("empty response from provider (reason: {})", .reason.as_deref().unwrap_or("unknown"))]
    EmptyResponse { reason: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_display_mentions_status() {
        let err = LLMError::RateLimit {
            retry_after: Some(30),
            message: "slow down".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("slow down"));
    }

    #[test]
    fn test_empty_response_display() {
        let err = LLMError::EmptyResponse {
            reason: Some("SAFETY".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "empty response from provider (reason: SAFETY)"
        );

        let err = LLMError::EmptyResponse { reason: None };
        assert!(err.to_string().contains("unknown"));
    }
}
