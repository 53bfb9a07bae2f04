use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    /// Base URL including the `/v1` segment, without a trailing slash.
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    pub max_error_body_bytes: usize,
}

impl OpenAiClientConfig {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: None,
            timeout: Duration::from_secs(120),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("completion carried no message content")]
    EmptyCompletion,
}

impl OpenAiClientError {
    /// True when the host could not be reached or did not answer in time.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Thin client for an OpenAI-compatible `/chat/completions` endpoint (Ollama, vLLM, llama.cpp).
///
/// Issues exactly one HTTP request per call. Retry policy belongs to callers.
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, OpenAiClientError> {
        let http = reqwest::Client::builder()
            .user_agent("meal-planner/generation")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
            return Err(upstream_error(status, body));
        }

        let bytes = resp.bytes().await?;
        let parsed = serde_json::from_slice::<ChatCompletionResponse>(&bytes)?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        Ok(parsed)
    }

    /// Send a system + user prompt pair and return the assistant's raw text.
    ///
    /// Requests JSON-mode output; hosts that ignore `response_format` still return text,
    /// which callers must treat as possibly malformed.
    pub async fn complete_json(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<String, OpenAiClientError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: None,
            stream: Some(false),
            response_format: Some(ResponseFormat::json_object()),
        };
        let response = self.chat_completions(&request).await?;
        first_content(response)
    }
}

fn first_content(response: ChatCompletionResponse) -> Result<String, OpenAiClientError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|s| !s.trim().is_empty())
        .ok_or(OpenAiClientError::EmptyCompletion)
}

fn upstream_error(status: StatusCode, body: String) -> OpenAiClientError {
    if let Ok(parsed) = serde_json::from_str::<OpenAiErrorEnvelope>(&body) {
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown upstream error".to_string());
        return OpenAiClientError::Upstream { status, message };
    }
    OpenAiClientError::UpstreamBody { status, body }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorObject,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorObject {
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_prefers_json_envelope() {
        let body = r#"{"error":{"message":"model 'llama9' not found","type":"invalid_request"}}"#;
        match upstream_error(StatusCode::NOT_FOUND, body.to_string()) {
            OpenAiClientError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "model 'llama9' not found");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn upstream_error_keeps_plain_body() {
        match upstream_error(StatusCode::BAD_GATEWAY, "bad gateway".to_string()) {
            OpenAiClientError::UpstreamBody { body, .. } => assert_eq!(body, "bad gateway"),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn first_content_reads_assistant_text() {
        let raw = r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"{\"title\":\"x\"}"},"finish_reason":"stop"}],"usage":null}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_content(response).unwrap(), r#"{"title":"x"}"#);
    }

    #[test]
    fn first_content_rejects_blank_message() {
        let raw = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            first_content(response),
            Err(OpenAiClientError::EmptyCompletion)
        ));
    }

    #[test]
    fn request_serializes_json_mode() {
        let request = ChatCompletionRequest {
            model: "llama3".to_string(),
            messages: vec![],
            temperature: Some(0.3),
            max_tokens: None,
            stream: Some(false),
            response_format: Some(ResponseFormat::json_object()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!(value.get("max_tokens").is_none());
    }
}
