//! OpenAI-compatible chat-completions client.

use super::LanguageModel;
use super::types::{ApiError, ChatMessage, CompletionRequest, CompletionResponse};
use crate::config::Config;
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Non-streaming chat model behind `POST {base_url}/chat/completions`.
///
/// One instance is shared by every request so the underlying connection pool
/// is reused.
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> AgentResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }

    pub fn from_config(config: &Config) -> AgentResult<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            AgentError::invalid_input("No API key configured. Set OPENAI_API_KEY")
        })?;
        Self::new(
            api_key,
            &config.llm_base_url,
            &config.llm_model,
            config.llm_temperature,
            config.llm_timeout_duration(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = match serde_json::from_str::<ApiError>(&error_text) {
                Ok(api_error) => api_error.error.message,
                Err(_) => error_text,
            };
            warn!(status = status.as_u16(), model = %self.model, "Chat completion failed");
            return Err(AgentError::llm(format!(
                "Provider returned {}: {}",
                status, message
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::llm(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &body.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion usage"
            );
        }

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::llm("No completion in response"))?;
        if choice.finish_reason.as_deref() == Some("length") {
            warn!(model = %self.model, "Completion truncated at the token limit");
        }
        choice
            .message
            .content
            .ok_or_else(|| AgentError::llm("Completion has no text content"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let model = OpenAiChatModel::new(
            "sk-test",
            "http://localhost:8080/v1/",
            "gpt-4o",
            0.0,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(model.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(model.model_name(), "gpt-4o");
    }

    #[test]
    fn test_debug_redacts_key() {
        let model = OpenAiChatModel::new(
            "sk-secret",
            "https://api.openai.com/v1",
            "gpt-4o",
            0.0,
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{:?}", model);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = Config::default();
        config.openai_api_key = Some("   ".to_string());
        assert!(OpenAiChatModel::from_config(&config).is_err());
        config.openai_api_key = Some("sk-test".to_string());
        assert!(OpenAiChatModel::from_config(&config).is_ok());
    }
}
