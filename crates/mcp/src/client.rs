//! Provider process management (spawn, communicate, lifecycle).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};

/// Default timeout for provider operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum response line size (1MB).
/// Sized for large tool outputs.
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Configuration for a tool provider process.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Handle to a running tool provider.
///
/// The handle owns the child process for the client's lifetime. [`shutdown`]
/// is idempotent: calling it a second time (or on a provider that already
/// exited) is a no-op.
///
/// [`shutdown`]: Provider::shutdown
#[derive(Debug)]
pub struct Provider {
    config: ProviderConfig,
    process: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
    next_id: AtomicI64,
    initialized: Mutex<bool>,
    provider_info: Mutex<Option<InitializeResult>>,
    closed: Mutex<bool>,
}

impl Provider {
    /// Spawn a new provider process.
    pub async fn spawn(config: ProviderConfig) -> Result<Self> {
        info!(provider = %config.name, command = %config.command, "spawning tool provider");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut process = cmd.spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        Ok(Self {
            config,
            process: Mutex::new(process),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicI64::new(1),
            initialized: Mutex::new(false),
            provider_info: Mutex::new(None),
            closed: Mutex::new(false),
        })
    }

    /// Get the provider name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Initialize the provider (must be called before other operations).
    pub async fn initialize(&self) -> Result<&Self> {
        let params = InitializeParams::default();
        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        // Send initialized notification
        self.notify("notifications/initialized", None::<()>).await?;

        info!(
            provider = %self.config.name,
            server = %result.server_info.name,
            "provider initialized"
        );

        *self.provider_info.lock().await = Some(result);
        *self.initialized.lock().await = true;

        Ok(self)
    }

    /// Check if the provider is initialized.
    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Get provider info (after initialization).
    pub async fn provider_info(&self) -> Option<InitializeResult> {
        self.provider_info.lock().await.clone()
    }

    /// List the tools the provider currently exposes.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        if !*self.initialized.lock().await {
            return Err(Error::NotInitialized);
        }

        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        debug!(provider = %self.config.name, count = result.tools.len(), "listed tools");
        Ok(result.tools)
    }

    /// Call a tool by name.
    ///
    /// A result flagged `is_error` by the provider surfaces as
    /// [`Error::ToolCallFailed`] carrying the provider's error text.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResult> {
        if !*self.initialized.lock().await {
            return Err(Error::NotInitialized);
        }

        debug!(provider = %self.config.name, tool = name, "calling tool");

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            let error_text = result
                .content
                .iter()
                .filter_map(|c| c.as_text())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::ToolCallFailed(error_text));
        }

        Ok(result)
    }

    /// Check if the provider process is still running.
    pub async fn is_running(&self) -> bool {
        let mut process = self.process.lock().await;
        matches!(process.try_wait(), Ok(None))
    }

    /// Shut down the provider.
    ///
    /// Safe to call more than once; secondary failures are logged, never
    /// returned.
    pub async fn shutdown(&self) {
        let mut closed = self.closed.lock().await;
        if *closed {
            debug!(provider = %self.config.name, "provider already shut down");
            return;
        }
        *closed = true;

        // Best-effort shutdown notification before killing the process.
        if let Err(e) = self.notify("shutdown", None::<()>).await {
            debug!(provider = %self.config.name, error = %e, "shutdown notification failed");
        }

        let mut process = self.process.lock().await;
        if let Err(e) = process.kill().await {
            warn!(provider = %self.config.name, error = %e, "failed to kill provider process");
        }

        info!(provider = %self.config.name, "provider shut down");
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        // Send request
        let request_json = serde_json::to_string(&request)?;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(request_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        // Read response with timeout
        let response = timeout(self.config.timeout, self.read_response())
            .await
            .map_err(|_| Error::Timeout)??;

        // Verify response ID matches
        if response.id != id {
            return Err(Error::InvalidResponse(format!(
                "response ID mismatch: expected {id:?}, got {:?}",
                response.id
            )));
        }

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }

    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: serde::Serialize,
    {
        // Notifications have no ID
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.and_then(|p| serde_json::to_value(p).ok())
        });

        let notification_json = serde_json::to_string(&notification)?;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(notification_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        Ok(())
    }

    async fn read_response(&self) -> Result<JsonRpcResponse> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();

        // The cap applies to the read itself; a line past the limit is
        // never buffered whole.
        let mut limited = (&mut *stdout).take((MAX_OUTPUT_SIZE + 1) as u64);
        let bytes_read = limited.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(Error::ProviderExited);
        }

        if line.len() > MAX_OUTPUT_SIZE {
            return Err(Error::OutputTooLarge {
                size: line.len(),
                max: MAX_OUTPUT_SIZE,
            });
        }

        let response: JsonRpcResponse = serde_json::from_str(&line)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_builder() {
        let config = ProviderConfig::new("weather", "vane-weather")
            .args(["--verbose"])
            .cwd("/tmp")
            .timeout(Duration::from_secs(5));
        assert_eq!(config.name, "weather");
        assert_eq!(config.args, vec!["--verbose".to_string()]);
        assert_eq!(config.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        // `cat` reads stdin forever, so it stands in for a provider process.
        let provider = Provider::spawn(ProviderConfig::new("noop", "cat"))
            .await
            .unwrap();

        assert!(provider.is_running().await);
        provider.shutdown().await;
        provider.shutdown().await;
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected() {
        // Scripted provider that answers the first request under the wrong id.
        let config = ProviderConfig::new("scripted", "sh").args([
            "-c",
            r#"read -r line; echo '{"jsonrpc":"2.0","id":999,"result":{}}'"#,
        ]);
        let provider = Provider::spawn(config).await.unwrap();

        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
        provider.shutdown().await;
    }

    #[tokio::test]
    async fn error_flagged_result_is_tool_call_failure() {
        // Scripted provider: valid handshake, then a tools/call answer
        // flagged isError.
        let script = r#"read -r line
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"scripted"}}}'
read -r line
read -r line
echo '{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"city not found"}],"isError":true}}'"#;
        let provider = Provider::spawn(ProviderConfig::new("scripted", "sh").args(["-c", script]))
            .await
            .unwrap();
        provider.initialize().await.unwrap();

        let err = provider
            .call_tool("get_current_weather", None)
            .await
            .unwrap_err();
        match err {
            Error::ToolCallFailed(message) => assert_eq!(message, "city not found"),
            other => panic!("unexpected error: {other:?}"),
        }
        provider.shutdown().await;
    }

    #[tokio::test]
    async fn oversized_response_line_is_rejected() {
        // Scripted provider that answers with a line past the output cap.
        let script = r#"read -r line; head -c 1100000 /dev/zero | tr '\0' x; echo"#;
        let provider = Provider::spawn(ProviderConfig::new("scripted", "sh").args(["-c", script]))
            .await
            .unwrap();

        let err = provider.initialize().await.unwrap_err();
        assert!(matches!(err, Error::OutputTooLarge { .. }));
        provider.shutdown().await;
    }

    #[tokio::test]
    async fn call_before_initialize_fails() {
        let provider = Provider::spawn(ProviderConfig::new("noop", "cat"))
            .await
            .unwrap();

        let err = provider.call_tool("anything", None).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
        provider.shutdown().await;
    }
}
