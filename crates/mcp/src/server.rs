//! Provider-side serving loop.
//!
//! A tool provider process reads newline-delimited JSON-RPC requests from
//! stdin and writes responses to stdout. Anything the process wants to log
//! must go to stderr; stdout belongs to the protocol.

use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{
    CallToolResult, InitializeResult, JsonRpcError, JsonRpcResponse, ListToolsResult, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};

/// A provider's tool surface.
///
/// Implementations declare their tools and execute calls. `call_tool` should
/// report tool-level failures through [`CallToolResult::error`] rather than
/// panicking; the serving loop never unwinds on a failed call.
pub trait ToolHandler: Send + Sync {
    /// Tools this provider exposes.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a tool call.
    fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> impl Future<Output = CallToolResult> + Send;
}

/// Incoming message: request (has `id`) or notification (no `id`).
#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    id: Option<RequestId>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IncomingCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Serve a handler over stdin/stdout until stdin closes.
pub async fn serve<H: ToolHandler>(handler: H, info: ServerInfo) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_io(handler, info, stdin, stdout).await
}

async fn serve_io<H, R, W>(handler: H, info: ServerInfo, reader: R, mut writer: W) -> Result<()>
where
    H: ToolHandler,
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(server = %info.name, "tool provider serving on stdio");

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let incoming: Incoming = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "discarding unparseable message");
                continue;
            }
        };

        let Some(id) = incoming.id else {
            // Notification: nothing to answer.
            debug!(method = %incoming.method, "notification received");
            continue;
        };

        let response = dispatch(&handler, &info, id, &incoming.method, incoming.params).await;
        write_response(&mut writer, &response).await?;
    }

    info!(server = %info.name, "stdin closed, provider exiting");
    Ok(())
}

async fn dispatch<H: ToolHandler>(
    handler: &H,
    info: &ServerInfo,
    id: RequestId,
    method: &str,
    params: Option<Value>,
) -> JsonRpcResponse {
    debug!(%method, "request received");

    match method {
        "initialize" => {
            let result = InitializeResult {
                protocol_version: "2024-11-05".to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability::default()),
                },
                server_info: info.clone(),
            };
            success(id, &result)
        }
        "tools/list" => {
            let result = ListToolsResult {
                tools: handler.tools(),
            };
            success(id, &result)
        }
        "tools/call" => {
            let params: IncomingCallParams = match params
                .ok_or_else(|| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "missing params"))
                .and_then(|p| {
                    serde_json::from_value(p).map_err(|e| {
                        JsonRpcError::new(JsonRpcError::INVALID_PARAMS, e.to_string())
                    })
                }) {
                Ok(p) => p,
                Err(e) => return JsonRpcResponse::failure(id, e),
            };

            let result = handler.call_tool(&params.name, params.arguments).await;
            success(id, &result)
        }
        other => JsonRpcResponse::failure(id, JsonRpcError::method_not_found(other)),
    }
}

fn success(id: RequestId, result: &impl serde::Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(
            id,
            JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
