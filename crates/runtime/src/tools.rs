//! Tool registry adapter and tool execution.

use std::future::Future;
use std::sync::Arc;

use mcp::{Provider, Tool};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::backend::{BackendFunction, BackendTool};
use crate::{Error, Result};

/// Convert provider-declared tool descriptors into the backend's
/// calling-format.
///
/// Pure function: preserves descriptor order, performs no deduplication, and
/// fails only when a descriptor lacks a required field.
pub fn convert_tools(descriptors: &[Tool]) -> Result<Vec<BackendTool>> {
    descriptors
        .iter()
        .map(|tool| {
            let description = tool.description.clone().ok_or_else(|| {
                Error::Descriptor(format!("tool '{}' has no description", tool.name))
            })?;
            if tool.input_schema.is_null() {
                return Err(Error::Descriptor(format!(
                    "tool '{}' has no input schema",
                    tool.name
                )));
            }
            Ok(BackendTool {
                kind: "function",
                function: BackendFunction {
                    name: tool.name.clone(),
                    description,
                    parameters: tool.input_schema.clone(),
                },
            })
        })
        .collect()
}

/// Normalized success payload from a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    /// Provider returned valid JSON text.
    Json(Value),
    /// Provider returned plain text.
    Text(String),
    /// Provider returned no content at all. Distinct from an empty string
    /// or JSON null so callers can tell a no-op from a genuinely empty
    /// result.
    NoContent,
}

/// Outcome of a tool execution.
///
/// Failures never propagate past the executor as errors; they become an
/// `Error` outcome the loop appends to the transcript for the model to react
/// to.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(ToolPayload),
    Error { message: String },
}

impl ToolOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Render the outcome as transcript text. The transcript only ever
    /// holds text; the backend's wire contract is strictly textual.
    pub fn transcript_text(&self) -> String {
        match self {
            Self::Success(ToolPayload::Json(value)) => value.to_string(),
            Self::Success(ToolPayload::Text(text)) => text.clone(),
            Self::Success(ToolPayload::NoContent) => "(no content)".to_string(),
            Self::Error { message } => json!({ "error": message }).to_string(),
        }
    }
}

/// Trait for tool dispatch, the seam between the session loop and the
/// tool-provider connection.
pub trait ToolDispatch: Send + Sync {
    /// Invoke a named tool. Infallible by contract: every failure is folded
    /// into the returned outcome.
    fn call(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> impl Future<Output = ToolOutcome> + Send;

    /// Release the tool-provider connection. Idempotent.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// Executes tools over a tool-provider connection.
pub struct ToolExecutor {
    provider: Arc<Provider>,
}

impl ToolExecutor {
    pub fn new(provider: Arc<Provider>) -> Self {
        Self { provider }
    }

    fn normalize(result: mcp::CallToolResult) -> ToolPayload {
        let Some(text) = result.content.iter().find_map(|c| c.as_text()) else {
            return ToolPayload::NoContent;
        };

        match serde_json::from_str::<Value>(text) {
            Ok(value) => ToolPayload::Json(value),
            Err(_) => ToolPayload::Text(text.to_string()),
        }
    }
}

impl ToolDispatch for ToolExecutor {
    async fn call(&self, name: &str, arguments: &Map<String, Value>) -> ToolOutcome {
        debug!(tool = name, "executing tool");

        let arguments = Value::Object(arguments.clone());
        match self.provider.call_tool(name, Some(arguments)).await {
            Ok(result) => {
                let payload = Self::normalize(result);
                debug!(tool = name, "tool executed");
                ToolOutcome::Success(payload)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                ToolOutcome::error(e.to_string())
            }
        }
    }

    async fn shutdown(&self) {
        self.provider.shutdown().await;
    }
}
