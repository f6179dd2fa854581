//! Google Gemini provider.
//!
//! Gemini has no system channel, so the instruction is replayed as a leading
//! user turn followed by a canned model acknowledgment. Requests go through
//! a [`ChatSession`]: the session is seeded with every turn but the last,
//! and only the final turn is sent.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::attachment::Attachment;
use super::error::{LLMError, error_from_response};
use super::provider::LLMProvider;
use super::types::{Message, Role};
use crate::config::GeminiConfig;

/// Model reply that closes the synthetic system exchange.
pub const SYSTEM_ACKNOWLEDGMENT: &str = "Understood. I will act as the medical assistant.";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    fn as_str(self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        }
    }
}

/// One part of a turn. Images stay as native attachments until the request
/// is serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image(Attachment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn text(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// Gemini provider.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    generation: GenerationConfig,
    relax_safety: bool,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("relax_safety", &self.relax_safety)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(client: Client, config: &GeminiConfig, api_key: String) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            generation: GenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            },
            relax_safety: config.relax_safety,
        }
    }

    /// Open a chat session seeded with prior turns.
    pub fn start_chat(&self, history: Vec<Turn>) -> ChatSession<'_> {
        ChatSession {
            provider: self,
            history,
        }
    }

    async fn generate(&self, contents: Vec<Content>) -> Result<String, LLMError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = Request {
            contents,
            safety_settings: self.safety_settings(),
            generation_config: self.generation.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Response = response.json().await?;
        response_text(body)
    }

    fn safety_settings(&self) -> Vec<SafetySetting> {
        if !self.relax_safety {
            return Vec::new();
        }
        SAFETY_CATEGORIES
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn respond(
        &self,
        system: &str,
        conversation: &[Message],
        attachment: Option<&Attachment>,
    ) -> Result<String, LLMError> {
        let mut turns = build_turns(system, conversation, attachment);
        let Some(last) = turns.pop() else {
            return Err(LLMError::EmptyResponse {
                reason: Some("nothing to send".to_string()),
            });
        };

        let mut session = self.start_chat(turns);
        session.send_message(last).await
    }
}

/// A chat seeded with history; each send carries the history plus one turn.
pub struct ChatSession<'a> {
    provider: &'a GeminiProvider,
    history: Vec<Turn>,
}

impl ChatSession<'_> {
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Send one turn. On success the turn and the reply join the history.
    pub async fn send_message(&mut self, turn: Turn) -> Result<String, LLMError> {
        let mut contents: Vec<Content> = self.history.iter().map(Content::from).collect();
        contents.push(Content::from(&turn));
        debug!(
            model = %self.provider.model,
            history = self.history.len(),
            parts = turn.parts.len(),
            "Sending Gemini chat message"
        );

        let reply = self.provider.generate(contents).await?;
        self.history.push(turn);
        self.history.push(Turn::text(TurnRole::Model, reply.clone()));
        Ok(reply)
    }
}

/// Synthesize the system exchange, then replay the conversation. An
/// attachment is appended as an extra part on the final user turn.
pub(crate) fn build_turns(
    system: &str,
    conversation: &[Message],
    attachment: Option<&Attachment>,
) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(conversation.len() + 2);
    turns.push(Turn::text(TurnRole::User, system));
    turns.push(Turn::text(TurnRole::Model, SYSTEM_ACKNOWLEDGMENT));

    let last = conversation.len().saturating_sub(1);
    for (i, msg) in conversation.iter().enumerate() {
        let role = match msg.role {
            Role::User => TurnRole::User,
            Role::Assistant => TurnRole::Model,
        };
        let mut turn = Turn::text(role, msg.content.clone());
        if let Some(image) = attachment
            && i == last
            && role == TurnRole::User
        {
            turn.parts.push(Part::Image(image.clone()));
        }
        turns.push(turn);
    }

    turns
}

fn response_text(response: Response) -> Result<String, LLMError> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(LLMError::EmptyResponse {
            reason: block_reason.or_else(|| Some("no candidates".to_string())),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LLMError::EmptyResponse {
            reason: candidate.finish_reason,
        });
    }
    Ok(text)
}

// --- Wire format ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<WirePart>,
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            parts: turn
                .parts
                .iter()
                .map(|part| match part {
                    Part::Text(text) => WirePart::Text { text: text.clone() },
                    Part::Image(image) => WirePart::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: image.to_base64(),
                        },
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
