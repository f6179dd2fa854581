//! Medassist - A terminal health assistant backed by OpenAI or Gemini.

pub mod app;
pub mod config;
pub mod consult;
pub mod credentials;
pub mod dashboard;
pub mod llm;
pub mod prompts;
pub mod report;
pub mod router;
pub mod store;
pub mod symptoms;

#[cfg(test)]
mod testing;
