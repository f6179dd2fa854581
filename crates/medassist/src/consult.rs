//! The general symptom consultation chat.

use tracing::{debug, warn};

use crate::llm::{Attachment, Conversation, ProviderKind};
use crate::prompts::CONSULT_PROMPT;
use crate::router::{RouteError, Router};
use crate::store::TrendStore;
use crate::symptoms::severity;

/// Owns the consult conversation for one session.
#[derive(Debug, Default)]
pub struct ConsultSession {
    conversation: Conversation,
}

impl ConsultSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Submit a new user message.
    ///
    /// The user turn stays in the conversation even when the call fails, so
    /// [`ConsultSession::retry`] can resubmit it. On success the reply is
    /// appended and the message's symptom count joins the trend.
    pub async fn send(
        &mut self,
        router: &Router,
        provider: ProviderKind,
        trend: &mut TrendStore,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<String, RouteError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RouteError::InvalidRequest("message is empty"));
        }

        self.conversation.push_user(text);
        let reply = router
            .respond(provider, CONSULT_PROMPT, self.conversation.messages(), attachment)
            .await?;
        self.conversation.push_assistant(reply.clone());

        let count = severity(text);
        if let Err(e) = trend.append(count).await {
            warn!(error = %e, "Failed to persist severity trend");
        }
        debug!(count, "Recorded symptom count");
        Ok(reply)
    }

    /// Regenerate the reply to the latest user message.
    ///
    /// A trailing assistant turn is discarded first; the trend is not touched.
    pub async fn retry(
        &mut self,
        router: &Router,
        provider: ProviderKind,
        attachment: Option<&Attachment>,
    ) -> Result<String, RouteError> {
        let discarded = self.conversation.discard_trailing_reply();
        if !self.conversation.awaits_reply() {
            if let Some(reply) = discarded {
                self.conversation.push_assistant(reply.content);
            }
            return Err(RouteError::InvalidRequest("nothing to retry"));
        }

        let reply = router
            .respond(provider, CONSULT_PROMPT, self.conversation.messages(), attachment)
            .await?;
        self.conversation.push_assistant(reply.clone());
        Ok(reply)
    }

    /// Start over with an empty conversation.
    pub fn new_chat(&mut self) {
        self.conversation.clear();
    }
}
