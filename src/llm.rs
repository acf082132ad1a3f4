// src/llm.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationSettings;
use crate::error::{Result, WorkerError};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.0;

/// One prompt in, one reply text out. The pipeline only ever needs this
/// much; tests substitute a scripted implementation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
struct ContentPart<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API client. Deterministic settings (temperature 0)
/// since the reply must carry a machine-parsable JSON block.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(settings: &GenerationSettings) -> Self {
        AnthropicBackend {
            client: reqwest::Client::new(),
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        }
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![Message {
                role: "user",
                content: vec![ContentPart {
                    kind: "text",
                    text: prompt,
                }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                WorkerError::GenerationError(format!("Backend request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::GenerationError(format!(
                "Backend returned {}: {}",
                status, body
            )));
        }

        let reply: MessagesResponse = response.json().await.map_err(|e| {
            WorkerError::GenerationError(format!("Failed to decode backend reply: {}", e))
        })?;

        let text = reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| {
                WorkerError::GenerationError(
                    "Backend reply contained no text content".to_string(),
                )
            })?;

        debug!(model = %self.model, chars = text.len(), "Backend reply received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_matches_messages_api_shape() {
        let request = MessagesRequest {
            model: "claude-3-5-sonnet-20241022",
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![Message {
                role: "user",
                content: vec![ContentPart {
                    kind: "text",
                    text: "a prompt",
                }],
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(value["max_tokens"], 2000);
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(value["messages"][0]["content"][0]["text"], "a prompt");
    }

    #[test]
    fn test_reply_text_is_first_text_block() {
        let raw = r#"{
            "id": "msg_01",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "<json_format>{}</json_format>"}
            ],
            "model": "claude-3-5-sonnet-20241022"
        }"#;
        let reply: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text = reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text);
        assert_eq!(text.as_deref(), Some("<json_format>{}</json_format>"));
    }
}
