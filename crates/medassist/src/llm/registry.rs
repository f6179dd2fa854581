//! Provider registry for managing LLM provider instances.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use super::gemini::GeminiProvider;
use super::openai::OpenAIProvider;
use super::provider::{LLMProvider, ProviderKind};
use crate::config::ProvidersConfig;
use crate::credentials::Credentials;

/// Registry of LLM providers, keyed by provider kind.
///
/// A provider is only registered when its credential is present, so a
/// missing entry means the call must be refused before dispatch.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build providers for every credential that is set.
    pub fn from_credentials(
        client: &Client,
        config: &ProvidersConfig,
        credentials: &Credentials,
    ) -> Self {
        let mut registry = Self::new();

        if let Some(api_key) = credentials.api_key(ProviderKind::OpenAI) {
            let provider = OpenAIProvider::new(client.clone(), &config.openai, api_key.to_string());
            registry.register(ProviderKind::OpenAI, Arc::new(provider));
            info!(model = %config.openai.model, "Registered OpenAI provider");
        }

        if let Some(api_key) = credentials.api_key(ProviderKind::Gemini) {
            let provider = GeminiProvider::new(client.clone(), &config.gemini, api_key.to_string());
            registry.register(ProviderKind::Gemini, Arc::new(provider));
            info!(model = %config.gemini.model, "Registered Gemini provider");
        }

        if registry.providers.is_empty() {
            warn!("No LLM providers configured. Set OPENAI_API_KEY or GEMINI_API_KEY.");
        }

        registry
    }

    /// Register a provider implementation.
    pub fn register(&mut self, provider: ProviderKind, implementation: Arc<dyn LLMProvider>) {
        self.providers.insert(provider, implementation);
    }

    /// Get a provider by kind.
    pub fn get(&self, provider: ProviderKind) -> Option<Arc<dyn LLMProvider>> {
        self.providers.get(&provider).cloned()
    }
}
