//! LLM provider clients for chat completions.

mod attachment;
mod error;
mod gemini;
mod openai;
mod provider;
mod registry;
mod types;

pub use attachment::{Attachment, AttachmentError};
pub use error::LLMError;
pub use gemini::{ChatSession, GeminiProvider, Part, SYSTEM_ACKNOWLEDGMENT, Turn, TurnRole};
pub use openai::OpenAIProvider;
pub use provider::{LLMProvider, ProviderKind, UnknownProvider};
pub use registry::ProviderRegistry;
pub use types::{Conversation, Message, Role};
