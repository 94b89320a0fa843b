//! Text inference capability.
//!
//! The engine treats the language model as an opaque text-completion
//! capability behind the [`TextInference`] trait. Two HTTP providers are
//! included (Anthropic and OpenAI-compatible); tests script their own
//! implementations.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Message role within a conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
}

/// Opaque text-completion capability.
#[async_trait]
pub trait TextInference: Send + Sync {
    /// Complete the given conversation, returning free text.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// Supported inference backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating an inference provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Override the API base URL (OpenAI-compatible local servers).
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Create an inference provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn TextInference>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => {
            let provider = AnthropicProvider::new(config)?;
            tracing::info!("Using Anthropic (model: {})", config.model);
            Ok(Arc::new(provider))
        }
        LlmBackend::OpenAi => {
            let provider = OpenAiProvider::new(config)?;
            tracing::info!("Using OpenAI (model: {})", config.model);
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hello")])
            .with_max_tokens(256)
            .with_temperature(0.0);
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn create_provider_constructs_without_network() {
        // Clients accept any key at construction time; auth failures happen
        // on the first request.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            timeout: Duration::from_secs(30),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn create_openai_provider() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o".to_string(),
            base_url: None,
            timeout: Duration::from_secs(30),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o");
    }
}
