//! Stdio client for one tool-provider process.
//!
//! The child's stdout is owned by a background reader task; every response
//! is matched to its waiting request through a `oneshot` keyed by request
//! id. When the reader stops, all pending requests fail with
//! [`McpError::TransportClosed`].

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use ghost_core::{ToolDescriptor, ToolProviderConfig};

use super::error::{McpError, Result};
use super::protocol::{
    CallToolResult, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponseOut, ListToolsResult, MessageKind, RpcError, classify_message,
    initialize_params,
};

/// Waiters keyed by request id; `None` once the reader has stopped
type Pending = Arc<std::sync::Mutex<Option<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>>;
type Writer = Arc<Mutex<ChildStdin>>;

pub struct McpClient {
    name: String,
    writer: Writer,
    pending: Pending,
    next_id: AtomicU64,
    child: Mutex<Option<Child>>,
    reader_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl McpClient {
    /// Launch the provider process and start the reader task
    pub fn spawn(config: &ToolProviderConfig) -> Result<Self> {
        debug!(provider = %config.name, command = %config.command, args = ?config.args, "Spawning tool provider");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(config.env_pairs())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::UnexpectedResponse("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::UnexpectedResponse("failed to capture stdout".into()))?;

        let writer: Writer = Arc::new(Mutex::new(stdin));
        let pending: Pending = Arc::new(std::sync::Mutex::new(Some(HashMap::new())));

        let reader_handle = tokio::spawn(Self::reader_loop(
            config.name.clone(),
            stdout,
            Arc::clone(&pending),
            Arc::clone(&writer),
        ));

        Ok(Self {
            name: config.name.clone(),
            writer,
            pending,
            next_id: AtomicU64::new(1),
            child: Mutex::new(Some(child)),
            reader_handle: std::sync::Mutex::new(Some(reader_handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Background reader loop, single owner of the child's stdout.
    async fn reader_loop(name: String, stdout: ChildStdout, pending: Pending, writer: Writer) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(provider = %name, "Tool provider closed stdout");
                    break;
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Tool provider read failed");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            trace!(provider = %name, "Received: {}", trimmed);

            let json: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(json) => json,
                Err(e) => {
                    warn!(provider = %name, error = %e, "Ignoring non-JSON line from tool provider");
                    continue;
                }
            };

            match classify_message(&json) {
                MessageKind::Response(id) => {
                    let sender = pending
                        .lock()
                        .ok()
                        .and_then(|mut p| p.as_mut().and_then(|waiters| waiters.remove(&id)));
                    match (sender, serde_json::from_value::<JsonRpcResponse>(json)) {
                        (Some(tx), Ok(response)) => {
                            let _ = tx.send(response);
                        }
                        (None, _) => debug!(provider = %name, id, "Response for unknown request"),
                        (Some(_), Err(e)) => {
                            warn!(provider = %name, id, error = %e, "Malformed response");
                        }
                    }
                }
                MessageKind::IncomingRequest => {
                    if let Err(e) = Self::answer_request(&writer, &json).await {
                        warn!(provider = %name, error = %e, "Failed to answer provider request");
                    }
                }
                MessageKind::Notification => {
                    debug!(provider = %name, method = ?json.get("method"), "Provider notification");
                }
            }
        }

        // Dropping the senders wakes every waiter with TransportClosed
        if let Ok(mut p) = pending.lock() {
            p.take();
        }
    }

    /// Reply to a provider-initiated request: `ping` succeeds, the rest are unsupported
    async fn answer_request(writer: &Writer, json: &serde_json::Value) -> Result<()> {
        let id = json.get("id").cloned().unwrap_or(serde_json::Value::Null);
        let method = json.get("method").and_then(|m| m.as_str()).unwrap_or_default();

        let response = if method == "ping" {
            JsonRpcResponseOut {
                jsonrpc: "2.0",
                id,
                result: Some(serde_json::json!({})),
                error: None,
            }
        } else {
            JsonRpcResponseOut {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(RpcError {
                    code: -32601,
                    message: format!("method not supported: {method}"),
                    data: None,
                }),
            }
        };
        Self::write_frame(writer, &response).await
    }

    async fn write_frame<T: serde::Serialize>(writer: &Writer, frame: &T) -> Result<()> {
        let mut line = serde_json::to_string(frame)?;
        trace!("Sending: {}", line);
        line.push('\n');

        let mut stdin = writer.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Send a request and wait for the correlated response
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        self.pending
            .lock()
            .map_err(|_| McpError::TransportClosed)?
            .as_mut()
            .ok_or(McpError::TransportClosed)?
            .insert(id, tx);

        let request = JsonRpcRequest::new(id, method, params);
        if let Err(e) = Self::write_frame(&self.writer, &request).await {
            if let Ok(mut pending) = self.pending.lock() {
                pending.as_mut().map(|waiters| waiters.remove(&id));
            }
            return Err(e);
        }

        let response = rx.await.map_err(|_| McpError::TransportClosed)?;
        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    pub async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        Self::write_frame(&self.writer, &JsonRpcNotification::new(method, params)).await
    }

    /// Protocol handshake: `initialize` then `notifications/initialized`
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let result = self.request("initialize", Some(initialize_params())).await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        self.notify("notifications/initialized", None).await?;

        debug!(
            provider = %self.name,
            protocol = %init.protocol_version,
            server = ?init.server_info.as_ref().map(|s| format!("{} {}", s.name, s.version)),
            "Tool provider initialized"
        );
        Ok(init)
    }

    /// All advertised tools, following pagination cursors
    pub async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    pub async fn invoke_tool(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CallToolResult> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Kill the process and stop the reader. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        if let Err(e) = child.start_kill() {
            debug!(provider = %self.name, error = %e, "Tool provider already exited");
        }
        if let Err(e) = child.wait().await {
            warn!(provider = %self.name, error = %e, "Failed to reap tool provider");
        }
        if let Some(handle) = self.reader_handle.lock().ok().and_then(|mut h| h.take()) {
            handle.abort();
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
    }
}
