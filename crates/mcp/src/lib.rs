//! Tool-provider wire layer: JSON-RPC 2.0 over newline-delimited stdio.
//!
//! This crate implements both halves of the tool-provider channel:
//!
//! - [`Provider`]: spawn a provider process, initialize it, discover its
//!   tools, and invoke them (the client half).
//! - [`ToolHandler`] + [`serve`]: expose tools from a provider process over
//!   its own stdin/stdout (the server half).
//!
//! # Client example
//!
//! ```no_run
//! use mcp::{Provider, ProviderConfig};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ProviderConfig::new("weather", "vane-weather");
//!
//! let provider = Provider::spawn(config).await?;
//! provider.initialize().await?;
//!
//! for tool in provider.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = provider.call_tool("get_current_weather", Some(serde_json::json!({
//!     "city": "London"
//! }))).await?;
//!
//! provider.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;
mod server;

pub use client::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, Provider, ProviderConfig};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, ServerCapabilities, ServerInfo,
    Tool, ToolContent,
};
pub use server::{ToolHandler, serve};
