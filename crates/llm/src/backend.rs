//! OpenAI-compatible chat backend
//!
//! Works with any server exposing `/chat/completions` (OpenAI, vLLM,
//! Ollama's `/v1`, llama.cpp server). A single request per call; retries live
//! in [`crate::ResilientModel`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use voice_call_config::LlmConfig;
use voice_call_core::{LanguageModel, Turn, TurnRole};

use crate::LlmError;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for OpenAiConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatModel {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.config.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn build_request<'a>(&'a self, history: &'a [Turn], user_text: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: &self.config.system_prompt,
        });
        messages.extend(history.iter().map(|turn| ChatMessage {
            role: match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            },
            content: &turn.text,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: user_text,
        });

        ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        }
    }

    async fn execute(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout)
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;
        parse_reply(&body)
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// 429 is rate limiting, 5xx is transient, everything else is final
fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited { retry_after }
    } else if status.is_server_error() {
        LlmError::Network(format!("Server error {}: {}", status, body))
    } else {
        LlmError::Api(format!("HTTP {}: {}", status, body))
    }
}

fn parse_reply(body: &str) -> Result<String, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::InvalidResponse("Empty completion".to_string()));
    }
    Ok(text.to_string())
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn generate(&self, history: &[Turn], user_text: &str) -> voice_call_core::Result<String> {
        let request = self.build_request(history, user_text);
        let start = std::time::Instant::now();
        let reply = self.execute(&request).await?;

        tracing::debug!(
            model = %self.config.model,
            latency_ms = start.elapsed().as_millis() as u64,
            chars = reply.len(),
            "LLM reply received"
        );
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OpenAiChatModel {
        OpenAiChatModel::new(OpenAiConfig {
            endpoint: "http://localhost:11434/v1/".to_string(),
            system_prompt: "Be brief.".to_string(),
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_chat_url_trims_slash() {
        assert_eq!(model().chat_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_request_orders_messages() {
        let model = model();
        let history = vec![Turn::user("hi"), Turn::assistant("hello, how can I help?")];
        let request = model.build_request(&history, "book a table");
        let json = serde_json::to_value(&request).unwrap();

        let roles: Vec<_> = json["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(json["messages"][3]["content"], "book a table");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(2)), String::new()),
            LlmError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(2)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, None, "upstream".into()),
            LlmError::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, "bad key".into()),
            LlmError::Api(_)
        ));
    }

    #[test]
    fn test_core_error_mapping_keeps_retryability() {
        let err: voice_call_core::Error = LlmError::RateLimited { retry_after: None }.into();
        assert!(err.is_retryable());
        let err: voice_call_core::Error = LlmError::Api("400".into()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Sure! "}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "Sure!");

        assert!(matches!(
            parse_reply(r#"{"choices":[]}"#),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(parse_reply("<html>").is_err());
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
