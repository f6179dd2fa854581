//! Routes a conversation to the selected provider and classifies failures.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProvidersConfig;
use crate::credentials::Credentials;
use crate::llm::{Attachment, LLMError, Message, ProviderKind, ProviderRegistry, Role};

/// Marker OpenAI puts in the body when the account has no quota left.
const QUOTA_MARKER: &str = "insufficient_quota";

/// A failed turn, phrased for the user. Nothing here is fatal; the caller
/// shows the message and may resubmit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Please select a model first (openai or gemini).")]
    NoProvider,

    #[error("Please set the {provider} API key ({}).", .provider.credential_key())]
    MissingCredential { provider: ProviderKind },

    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error("{provider} API quota exceeded. Check your billing details or switch provider.")]
    QuotaExceeded { provider: ProviderKind },

    #[error("{provider} API rate limit exceeded. Wait a minute or switch provider.")]
    RateLimited { provider: ProviderKind },

    #[error("{provider} returned an empty or filtered response. Try again or rephrase your message.")]
    EmptyResponse { provider: ProviderKind },

    #[error("{0}")]
    Provider(String),
}

impl RouteError {
    /// Classify a raw provider error message.
    pub fn classify(provider: ProviderKind, message: &str) -> Self {
        if message.contains(QUOTA_MARKER) {
            RouteError::QuotaExceeded { provider }
        } else if message.contains("429") {
            RouteError::RateLimited { provider }
        } else {
            RouteError::Provider(message.to_string())
        }
    }

    fn from_llm(provider: ProviderKind, err: &LLMError) -> Self {
        match err {
            LLMError::EmptyResponse { .. } => RouteError::EmptyResponse { provider },
            LLMError::RateLimit { message, .. } => {
                if message.contains(QUOTA_MARKER) {
                    RouteError::QuotaExceeded { provider }
                } else {
                    RouteError::RateLimited { provider }
                }
            }
            LLMError::Api { message, .. } => RouteError::classify(provider, message),
            other => RouteError::classify(provider, &other.to_string()),
        }
    }
}

/// Dispatches requests to whichever provider is selected per call.
#[derive(Clone)]
pub struct Router {
    client: Client,
    config: ProvidersConfig,
    registry: ProviderRegistry,
}

impl Router {
    pub fn new(config: ProvidersConfig, credentials: &Credentials) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        let registry = ProviderRegistry::from_credentials(&client, &config, credentials);
        Ok(Self {
            client,
            config,
            registry,
        })
    }

    /// Use a prebuilt registry instead of one derived from credentials.
    pub fn with_registry(config: ProvidersConfig, registry: ProviderRegistry) -> Self {
        Self {
            client: Client::new(),
            config,
            registry,
        }
    }

    /// Rebuild providers after credentials change.
    pub fn reload(&mut self, credentials: &Credentials) {
        self.registry = ProviderRegistry::from_credentials(&self.client, &self.config, credentials);
    }

    pub fn is_available(&self, provider: ProviderKind) -> bool {
        self.registry.get(provider).is_some()
    }

    /// Ask `provider` for the reply to the final user turn of `conversation`.
    ///
    /// The conversation is not modified; the caller appends the reply.
    pub async fn respond(
        &self,
        provider: ProviderKind,
        system: &str,
        conversation: &[Message],
        attachment: Option<&Attachment>,
    ) -> Result<String, RouteError> {
        if system.trim().is_empty() {
            return Err(RouteError::InvalidRequest("system instruction is empty"));
        }
        match conversation.last() {
            None => return Err(RouteError::InvalidRequest("conversation is empty")),
            Some(last) if last.role != Role::User => {
                return Err(RouteError::InvalidRequest(
                    "conversation must end with a user turn",
                ));
            }
            Some(_) => {}
        }

        let Some(backend) = self.registry.get(provider) else {
            return Err(RouteError::MissingCredential { provider });
        };

        debug!(
            provider = %provider,
            model = backend.model(),
            messages = conversation.len(),
            attachment = attachment.is_some(),
            "Routing conversation"
        );

        match backend.respond(system, conversation, attachment).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                warn!(provider = %provider, error = %err, "Provider call failed");
                Err(RouteError::from_llm(provider, &err))
            }
        }
    }
}
