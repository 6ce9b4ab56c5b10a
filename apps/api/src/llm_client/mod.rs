//! LLM client: the single point of entry for all Mistral API calls in Tera.
//!
//! No other module talks to the Mistral API. Chat, tools and anything else
//! that needs a completion goes through `LlmClient`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
/// The model used for conversations, tools and quizzes.
pub const MODEL: &str = "mistral-large-latest";
/// Cheaper model for background passes such as memory extraction.
pub const SMALL_MODEL: &str = "mistral-small-latest";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2048;
const MAX_RETRIES: u32 = 3;

/// Model parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    pub model: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask for a JSON object reply (`response_format: json_object`).
    pub json: bool,
}

impl CompletionSettings {
    pub const CHAT: Self = Self {
        model: MODEL,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        json: false,
    };

    pub const QUIZ: Self = Self {
        model: MODEL,
        temperature: TEMPERATURE,
        max_tokens: 3000,
        json: true,
    };

    pub const MEMORY: Self = Self {
        model: SMALL_MODEL,
        temperature: 0.1,
        max_tokens: 500,
        json: false,
    };
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM returned malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
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

#[derive(Debug, Serialize)]
struct MistralRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<&'a ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> MistralRequest<'a> {
    fn new(settings: CompletionSettings, messages: Vec<&'a ChatMessage>) -> Self {
        Self {
            model: settings.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            messages,
            response_format: settings.json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

/// Drops a Markdown code fence around a JSON reply, if the model added one.
fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    /// Text of the first choice, if it has any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct MistralError {
    message: String,
}

/// The single LLM client used by all services in Tera.
/// Wraps the Mistral chat completions API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build LLM HTTP client")?;
        Ok(Self { client, api_key })
    }

    /// Sends a conversation to Mistral, prefixed with `system`.
    pub async fn chat(&self, messages: &[ChatMessage], system: &str) -> Result<LlmResponse, LlmError> {
        self.chat_with(CompletionSettings::CHAT, messages, system).await
    }

    /// Like `chat`, with explicit model parameters.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn chat_with(
        &self,
        settings: CompletionSettings,
        messages: &[ChatMessage],
        system: &str,
    ) -> Result<LlmResponse, LlmError> {
        let system_message = ChatMessage {
            role: Role::System,
            content: system.to_string(),
        };
        let request_body = MistralRequest::new(
            settings,
            std::iter::once(&system_message).chain(messages).collect(),
        );

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(MISTRAL_API_URL)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<MistralError>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            if let Some(usage) = &llm_response.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Single-turn completion returning the reply text.
    pub async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.complete_with(CompletionSettings::CHAT, prompt, system).await
    }

    pub async fn complete_with(
        &self,
        settings: CompletionSettings,
        prompt: &str,
        system: &str,
    ) -> Result<String, LlmError> {
        let response = self
            .chat_with(settings, &[ChatMessage::user(prompt)], system)
            .await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }

    /// Single-turn completion in JSON mode, deserialized into `T`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        settings: CompletionSettings,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let settings = CompletionSettings { json: true, ..settings };
        let text = self.complete_with(settings, prompt, system).await?;
        Ok(serde_json::from_str(strip_json_fence(&text))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_puts_system_first() {
        let system = ChatMessage {
            role: Role::System,
            content: "sys".to_string(),
        };
        let history = [ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let body = MistralRequest::new(
            CompletionSettings::CHAT,
            std::iter::once(&system).chain(&history).collect(),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "mistral-large-latest");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["max_tokens"], 2048);
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_json_settings_request_json_object() {
        let user = ChatMessage::user("quiz me");
        let body = MistralRequest::new(CompletionSettings::QUIZ, vec![&user]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");

        let memory = MistralRequest::new(CompletionSettings::MEMORY, vec![&user]);
        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(json["model"], "mistral-small-latest");
        assert!((json["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_json_fence("```\n[]\n```"), "[]");
    }

    #[test]
    fn test_response_text_skips_blank() {
        let r: LlmResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  " } }]
        }))
        .unwrap();
        assert!(r.text().is_none());

        let r: LlmResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": "Mitochondria" } }],
            "usage": { "prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4 }
        }))
        .unwrap();
        assert_eq!(r.text(), Some("Mitochondria"));
    }
}
