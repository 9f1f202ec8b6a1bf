//! Outbound wire protocol to provider backends (§6): OpenAI-compatible
//! chat completions over HTTP/JSON, SSE streaming, and model discovery.
//!
//! Grounded on the starting codebase's `config.rs::check_endpoint_with_model`
//! — a bare `reqwest` GET against `{url}/models` with optional bearer auth
//! and a short timeout — generalized into the registry's full chat-
//! completion transport rather than a health-probe-only helper.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

use super::{ProviderConfig, ProviderType};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
    pub index: u32,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    pub choices: Vec<StreamChoice>,
}

fn auth_header(config: &ProviderConfig, key: &str) -> Option<(&'static str, String)> {
    if key.is_empty() || key == "not-needed" {
        return None;
    }
    match config.provider_type {
        ProviderType::Anthropic => Some(("X-API-Key", key.to_string())),
        _ => Some(("Authorization", format!("Bearer {key}"))),
    }
}

/// Thin wrapper over `reqwest` implementing the registry's three outbound
/// calls. A real credential is resolved by the caller (the credential
/// vault is out of core scope, §1) and passed in as `api_key`.
pub struct ProviderTransport {
    client: reqwest::Client,
}

impl Default for ProviderTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(CONNECT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { client }
    }

    pub async fn send_chat_completion(
        &self,
        config: &ProviderConfig,
        api_key: &str,
        mut req: ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        if req.model.is_empty() {
            req.model = config.model.clone();
        }
        req.stream = None;

        let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(&req);
        if let Some((header, value)) = auth_header(config, api_key) {
            builder = builder.header(header, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ProviderError::NotFound(config.model.clone()));
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth(config.id.clone()));
        }
        if status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if is_context_length_error(&body) {
                return Err(ProviderError::ContextLengthError { message: body });
            }
            return Err(ProviderError::Transient(body));
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient(format!("HTTP {status}")));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))
    }

    pub async fn get_models(
        &self,
        config: &ProviderConfig,
        api_key: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.get(&url).timeout(Duration::from_secs(5));
        if let Some((header, value)) = auth_header(config, api_key) {
            builder = builder.header(header, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Transient(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        let ids = body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// Parse one SSE `data: {...}` frame, returning `None` on the
    /// `[DONE]` terminator or a blank keep-alive line.
    pub fn parse_stream_frame(line: &str) -> Option<Result<StreamChunk, ProviderError>> {
        let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        Some(
            serde_json::from_str::<StreamChunk>(data)
                .map_err(|e| ProviderError::Transient(e.to_string())),
        )
    }
}

/// Detects the provider's context-length rejection message per §7:
/// "context length exceeded" / "maximum is N tokens".
pub fn is_context_length_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context length exceeded") || lower.contains("maximum is")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_context_length_phrases() {
        assert!(is_context_length_error(
            "This model's maximum context length exceeded"
        ));
        assert!(is_context_length_error(
            "maximum is 4096 tokens, but you requested 5000"
        ));
        assert!(!is_context_length_error("internal server error"));
    }

    #[test]
    fn parse_stream_frame_done_terminator() {
        assert!(ProviderTransport::parse_stream_frame("data: [DONE]").is_none());
    }

    #[test]
    fn parse_stream_frame_decodes_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"},"index":0,"finish_reason":null}]}"#;
        let chunk = ProviderTransport::parse_stream_frame(line).unwrap().unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));
    }

    #[test]
    fn parse_stream_frame_ignores_non_data_lines() {
        assert!(ProviderTransport::parse_stream_frame("").is_none());
        assert!(ProviderTransport::parse_stream_frame(": keep-alive").is_none());
    }
}
