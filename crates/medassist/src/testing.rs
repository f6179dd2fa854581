//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::ProvidersConfig;
use crate::llm::{Attachment, LLMError, LLMProvider, Message, ProviderKind, ProviderRegistry};
use crate::router::Router;

/// One recorded `respond` call.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub system: String,
    pub conversation: Vec<Message>,
    pub attachment: bool,
}

/// Replies from a queue and records every call.
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, LLMError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, LLMError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn respond(
        &self,
        system: &str,
        conversation: &[Message],
        attachment: Option<&Attachment>,
    ) -> Result<String, LLMError> {
        self.calls.lock().unwrap().push(Call {
            system: system.to_string(),
            conversation: conversation.to_vec(),
            attachment: attachment.is_some(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LLMError::EmptyResponse {
                reason: Some("script exhausted".to_string()),
            }))
    }
}

/// A router whose only provider is `provider`, registered as `kind`.
pub(crate) fn router_with(kind: ProviderKind, provider: Arc<ScriptedProvider>) -> Router {
    let mut registry = ProviderRegistry::new();
    registry.register(kind, provider);
    Router::with_registry(ProvidersConfig::default(), registry)
}
