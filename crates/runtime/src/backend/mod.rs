//! Model backend abstraction.
//!
//! Provides a trait for inference backends, allowing the session loop to be
//! driven by any provider (or by a scripted double in tests) through a
//! unified interface.

mod ollama;

pub use ollama::{OllamaBackend, OllamaBackendBuilder};

use crate::Result;
use crate::transcript::{ToolCall, Turn};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// A tool in the calling-format the backend expects: the provider-declared
/// descriptor wrapped as a function definition.
#[derive(Debug, Clone, Serialize)]
pub struct BackendTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: BackendFunction,
}

/// Function definition within a backend tool.
#[derive(Debug, Clone, Serialize)]
pub struct BackendFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Response from a model backend: final text and zero-or-more requested
/// tool calls.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Trait for model backends.
///
/// `chat` performs exactly one inference call; retry policy belongs to the
/// caller. `close` releases the outbound connection and must be safe to call
/// repeatedly.
pub trait LlmBackend: Send + Sync {
    /// Send the transcript (and available tools) for one inference pass.
    fn chat(
        &self,
        transcript: &[Turn],
        tools: Option<&[BackendTool]>,
    ) -> impl Future<Output = Result<ChatResponse>> + Send;

    /// Release the backend connection. Idempotent; secondary failures are
    /// logged, never returned.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
