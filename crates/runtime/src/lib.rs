//! Vane runtime — the tool-calling orchestration core.
//!
//! This crate drives one conversation with a local model, interleaving
//! inference with tool invocation until the model produces a final answer.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Transcript**: the ordered, append-only turn history exchanged with
//!   the model backend.
//! - **LlmBackend**: a trait abstracting inference backends ([`OllamaBackend`]
//!   is the provided implementation).
//! - **ToolDispatch / ToolExecutor**: tool invocation over a tool-provider
//!   connection, with failures folded into transcript entries.
//! - **Session**: owns the transcript and runs the bounded
//!   inference/dispatch loop.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp::{Provider, ProviderConfig};
//! use runtime::{OllamaBackend, Session, ToolExecutor};
//!
//! # async fn example() -> runtime::Result<()> {
//! let provider = Arc::new(Provider::spawn(ProviderConfig::new("weather", "vane-weather")).await?);
//! provider.initialize().await?;
//! let descriptors = provider.list_tools().await?;
//!
//! let backend = OllamaBackend::builder("qwen2.5:7b").build();
//! let mut session = Session::new(backend, ToolExecutor::new(provider), &descriptors)?;
//!
//! let answer = session.chat("What's the weather in London?").await?;
//! println!("{answer}");
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod session;
mod tools;
mod transcript;

pub use backend::{
    BackendFunction, BackendTool, ChatResponse, LlmBackend, OllamaBackend, OllamaBackendBuilder,
};
pub use error::{Error, Result};
pub use session::{DEFAULT_MAX_ITERATIONS, EXHAUSTED_MESSAGE, Session};
pub use tools::{ToolDispatch, ToolExecutor, ToolOutcome, ToolPayload, convert_tools};
pub use transcript::{FunctionCall, Role, SessionId, ToolCall, Transcript, Turn};
