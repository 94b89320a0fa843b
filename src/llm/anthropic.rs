//! Anthropic Messages API provider.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

use super::{Completion, CompletionRequest, LlmConfig, Role, TextInference};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: secrecy::SecretString,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Split the request into the Anthropic shape: system prompt is a
    /// top-level field, not a message role.
    fn build_body(&self, request: &CompletionRequest) -> AnthropicRequest {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User => messages.push(AnthropicMessage {
                    role: "user",
                    content: msg.content.clone(),
                }),
                Role::Assistant => messages.push(AnthropicMessage {
                    role: "assistant",
                    content: msg.content.clone(),
                }),
            }
        }
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
        }
    }
}

#[async_trait]
impl TextInference for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_body(&request);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let raw = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthFailed {
                provider: "anthropic".to_string(),
            });
        }
        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("HTTP {status}: {raw}"),
            });
        }

        let parsed: AnthropicResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: format!("{e}"),
            })?;

        let content = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: "response missing content".to_string(),
            })?;

        Ok(Completion { content })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use std::time::Duration;

    fn test_config() -> LlmConfig {
        LlmConfig {
            backend: super::super::LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test"),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn system_messages_lift_to_top_level() {
        let provider = AnthropicProvider::new(&test_config()).unwrap();
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        let body = provider.build_body(&request);
        assert_eq!(body.system.as_deref(), Some("be brief"));
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.messages[1].role, "assistant");
    }

    #[test]
    fn no_system_field_without_system_messages() {
        let provider = AnthropicProvider::new(&test_config()).unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let body = provider.build_body(&request);
        assert!(body.system.is_none());
    }
}
