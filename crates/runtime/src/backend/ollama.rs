//! Ollama API backend.

use super::{BackendTool, ChatResponse, LlmBackend};
use crate::transcript::{ToolCall, Turn};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [BackendTool]>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: String,
    // Absent or null when the model answered with text only.
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaBackendBuilder {
    /// Create a new builder for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the backend.
    pub fn build(self) -> OllamaBackend {
        OllamaBackend {
            client: reqwest::Client::new(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
            timeout: self.timeout,
            closed: AtomicBool::new(false),
        }
    }
}

/// Ollama chat backend.
///
/// Holds one HTTP connection pool for the process lifetime; `chat` performs
/// exactly one POST to `/api/chat` per invocation.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    closed: AtomicBool,
}

impl OllamaBackend {
    /// Create a builder for the Ollama backend.
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    /// The model this backend drives.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({}, {})", self.model, self.base_url)
    }
}

impl LlmBackend for OllamaBackend {
    async fn chat(
        &self,
        transcript: &[Turn],
        tools: Option<&[BackendTool]>,
    ) -> Result<ChatResponse> {
        let api_request = ApiRequest {
            model: &self.model,
            messages: transcript,
            stream: false,
            tools,
        };

        debug!(
            turns = transcript.len(),
            tools = tools.map_or(0, <[BackendTool]>::len),
            "sending chat request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else if e.is_connect() {
                    Error::Connect {
                        url: self.base_url.clone(),
                        message: e.to_string(),
                    }
                } else {
                    Error::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "backend returned error");
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(Error::ModelMissing {
                    model: self.model.clone(),
                });
            }
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let tool_calls = api_response.message.tool_calls.unwrap_or_default();
        debug!(tool_calls = tool_calls.len(), "chat response received");

        Ok(ChatResponse {
            content: api_response.message.content,
            tool_calls,
        })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("backend already closed");
            return;
        }
        // The connection pool is released when the client drops; there is
        // nothing else to tear down.
        debug!("backend closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let backend = OllamaBackend::builder("qwen2.5:7b").build();
        assert_eq!(backend.model(), "qwen2.5:7b");
        assert_eq!(backend.endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let backend = OllamaBackend::builder("m")
            .base_url("http://10.0.0.2:11434/")
            .build();
        assert_eq!(backend.endpoint(), "http://10.0.0.2:11434/api/chat");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let backend = OllamaBackend::builder("m").build();
        backend.close().await;
        backend.close().await;
        assert!(backend.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn request_payload_shape() {
        let turns = vec![Turn::user("hi")];
        let request = ApiRequest {
            model: "m",
            messages: &turns,
            stream: false,
            tools: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn response_without_tool_calls_parses() {
        let json = r#"{"message":{"content":"sunny today"}}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.message.content, "sunny today");
        assert!(resp.message.tool_calls.is_none());
    }

    #[test]
    fn response_with_tool_calls_parses() {
        let json = r#"{
            "message": {
                "content": "",
                "tool_calls": [
                    {"function": {"name": "get_current_weather", "arguments": {"city": "Paris"}}}
                ]
            }
        }"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        let calls = resp.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_current_weather");
    }
}
