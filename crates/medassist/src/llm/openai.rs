//! OpenAI chat-completions provider.
//!
//! Stateless: every call carries the system instruction plus the full
//! conversation as one message array.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::attachment::Attachment;
use super::error::{LLMError, error_from_response};
use super::provider::LLMProvider;
use super::types::{Message, Role};
use crate::config::OpenAIConfig;

/// OpenAI-compatible provider.
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAIProvider {
    #[must_use]
    pub fn new(client: Client, config: &OpenAIConfig, api_key: String) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn respond(
        &self,
        system: &str,
        conversation: &[Message],
        attachment: Option<&Attachment>,
    ) -> Result<String, LLMError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = Request {
            model: &self.model,
            messages: build_messages(system, conversation, attachment),
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Response = response.json().await?;
        if let Some(usage) = &body.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI completion usage"
            );
        }
        first_choice_text(body)
    }
}

// --- Wire format ---

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: Vec<RequestMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RequestMessage {
    role: &'static str,
    content: Content,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct Response {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Build the request array: the system instruction first, then every turn
/// 1:1. An attachment turns the final user entry into a text + image payload.
pub(crate) fn build_messages(
    system: &str,
    conversation: &[Message],
    attachment: Option<&Attachment>,
) -> Vec<RequestMessage> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(RequestMessage {
        role: "system",
        content: Content::Text(system.to_string()),
    });

    let last = conversation.len().saturating_sub(1);
    for (i, msg) in conversation.iter().enumerate() {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let content = match attachment {
            Some(image) if i == last && msg.role == Role::User => Content::Parts(vec![
                ContentPart::Text {
                    text: msg.content.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_uri(),
                    },
                },
            ]),
            _ => Content::Text(msg.content.clone()),
        };
        messages.push(RequestMessage { role, content });
    }

    messages
}

fn first_choice_text(response: Response) -> Result<String, LLMError> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(LLMError::EmptyResponse {
            reason: Some("no choices".to_string()),
        });
    };
    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LLMError::EmptyResponse {
            reason: choice.finish_reason,
        }),
    }
}
