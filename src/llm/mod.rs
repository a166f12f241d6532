//! Language model abstraction.
//!
//! The agent talks to the model through [`LanguageModel`], so tests can drive
//! it with scripted replies and deployments can point at any
//! OpenAI-compatible endpoint.

pub mod openai;
pub mod types;

pub use openai::OpenAiChatModel;
pub use types::{ChatMessage, Role};

use crate::error::AgentResult;
use async_trait::async_trait;

/// A chat-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete the conversation and return the assistant's text.
    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String>;

    /// Identifier used in logs.
    fn model_name(&self) -> &str;
}
