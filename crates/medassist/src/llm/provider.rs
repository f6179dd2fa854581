//! LLM provider trait and provider selection.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attachment::Attachment;
use super::error::LLMError;
use super::types::Message;

/// Trait for LLM providers with different API formats.
///
/// Each implementation owns the translation from the shared conversation
/// shape into its own wire format; nothing provider-specific leaks out.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Produce the assistant reply for the final user turn of `conversation`.
    ///
    /// `attachment`, when present, is bound to that final turn only.
    async fn respond(
        &self,
        system: &str,
        conversation: &[Message],
        attachment: Option<&Attachment>,
    ) -> Result<String, LLMError>;
}

/// The supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions (stateless message array).
    OpenAI,
    /// Google Gemini (chat session).
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAI, ProviderKind::Gemini];

    /// Name of the credential this provider needs.
    pub fn credential_key(self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Label shown to users and persisted as the saved selection.
    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "ChatGPT",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error("unknown provider '{0}' (expected one of: openai, chatgpt, gemini)")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(ProviderKind::OpenAI),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_labels_and_ids() {
        assert_eq!("ChatGPT".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!(" Gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_label_round_trips_through_parse() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.label().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_credential_keys_are_distinct() {
        assert_eq!(ProviderKind::OpenAI.credential_key(), "OPENAI_API_KEY");
        assert_eq!(ProviderKind::Gemini.credential_key(), "GEMINI_API_KEY");
    }
}
