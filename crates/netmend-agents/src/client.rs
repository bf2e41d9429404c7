//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use netmend_core::LlmConfig;
use netmend_runtime::AgentError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A model that answers one system + user prompt pair.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError>;
}

/// Show only the ends of a key.
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

/// Upstream error bodies can echo credentials back; keep them short and
/// replace anything auth-related with a fixed message.
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();
    if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("authentication") {
        return "API authentication error; check the configured API key".to_string();
    }
    if lower.contains("rate limit") || lower.contains("quota") {
        return "rate limit exceeded".to_string();
    }
    if error.chars().count() > 300 {
        let truncated: String = error.chars().take(300).collect();
        format!("{truncated}...(truncated)")
    } else {
        error.to_string()
    }
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiConfig {
    /// Build from [`LlmConfig`], reading the key from `api_key_env`.
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self, AgentError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::NotConfigured(format!("{} not set", config.api_key_env)))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            temperature: config.temperature,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient").field("config", &self.config).finish()
    }
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_llm_config(config: &LlmConfig) -> Result<Self, AgentError> {
        Self::new(OpenAiConfig::from_llm_config(config)?)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
        };

        tracing::debug!(model = %self.config.model, prompt_bytes = user.len(), "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Request(sanitize_api_error(&e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Http {
                status: status.as_u16(),
                body: sanitize_api_error(&body),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("invalid completion response: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AgentError::Parse("completion had no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_masked() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("sk-abcdefghijklmnop"), "sk-a...mnop");

        let config = OpenAiConfig {
            api_key: "sk-abcdefghijklmnop".into(),
            base_url: "http://localhost".into(),
            model: "m".into(),
            timeout: Duration::from_secs(1),
            temperature: 0.0,
        };
        assert!(!format!("{config:?}").contains("abcdefghijklmnop"));
    }

    #[test]
    fn auth_errors_are_sanitized() {
        assert_eq!(
            sanitize_api_error("Incorrect API key provided: sk-123"),
            "API authentication error; check the configured API key"
        );
        let long = "x".repeat(400);
        assert!(sanitize_api_error(&long).ends_with("...(truncated)"));
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = LlmConfig {
            api_key_env: "NETMEND_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        assert!(matches!(
            OpenAiConfig::from_llm_config(&config),
            Err(AgentError::NotConfigured(_))
        ));
    }
}
