//! MCP client — spawns an upstream server as a child process and exchanges
//! newline-delimited JSON-RPC 2.0 messages over its standard streams.

use crate::protocol::*;
use crate::upstream::UpstreamClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use toolgate_core::{ToolgateError, ToolgateResult};
use tracing::{debug, error, info};

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// A connected upstream MCP server.
pub struct McpClient {
    stdin: Arc<Mutex<tokio::process::ChildStdin>>,
    _child: Arc<Mutex<Child>>,
    pending: PendingMap,
    next_id: AtomicU64,
    server_name: String,
}

impl McpClient {
    /// Spawn the upstream process, perform the initialization handshake, and
    /// return the connected client.
    pub async fn connect(
        server_name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> ToolgateResult<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ToolgateError::Upstream(format!(
                "failed to spawn server '{server_name}' ({command}): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolgateError::Upstream(format!("server '{server_name}': no stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolgateError::Upstream(format!("server '{server_name}': no stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolgateError::Upstream(format!("server '{server_name}': no stderr")))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Reader task: route responses to their pending request.
        let pending_reader = pending.clone();
        let reader_server = server_name.to_string();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(server = %reader_server, "upstream stdout closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                            Ok(resp) => {
                                if let Some(id) = resp.id {
                                    let mut map = pending_reader.lock().await;
                                    if let Some(tx) = map.remove(&id) {
                                        let _ = tx.send(resp);
                                    }
                                }
                                // Notifications from the server are ignored.
                            }
                            Err(e) => {
                                debug!(server = %reader_server, line = %trimmed, error = %e,
                                    "non-JSON-RPC line from upstream");
                            }
                        }
                    }
                    Err(e) => {
                        error!(server = %reader_server, error = %e, "error reading upstream stdout");
                        break;
                    }
                }
            }
        });

        // Stderr task: forward upstream diagnostics line by line.
        let stderr_server = server_name.to_string();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end();
                        if !trimmed.is_empty() {
                            debug!(server = %stderr_server, "stderr: {trimmed}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let client = Self {
            stdin: Arc::new(Mutex::new(stdin)),
            _child: Arc::new(Mutex::new(child)),
            pending,
            next_id: AtomicU64::new(1),
            server_name: server_name.to_string(),
        };

        let init = client.initialize().await?;
        info!(
            server = %client.server_name,
            version = %init.protocol_version,
            implementation = %init
                .server_info
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unknown"),
            "upstream server initialized"
        );
        client
            .send(&JsonRpcRequest::notification(
                "notifications/initialized",
                None,
            ))
            .await?;

        Ok(client)
    }

    async fn send(&self, req: &JsonRpcRequest) -> ToolgateResult<()> {
        let msg = serde_json::to_string(req)?;
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(msg.as_bytes()).await.map_err(|e| {
            ToolgateError::Upstream(format!("server '{}': write failed: {e}", self.server_name))
        })?;
        stdin.write_all(b"\n").await.map_err(|e| {
            ToolgateError::Upstream(format!("server '{}': write failed: {e}", self.server_name))
        })?;
        stdin.flush().await.map_err(|e| {
            ToolgateError::Upstream(format!("server '{}': flush failed: {e}", self.server_name))
        })?;
        Ok(())
    }

    /// Send a request and wait for the matching response.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> ToolgateResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(id, tx);
        }

        if let Err(e) = self.send(&req).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let resp = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                return Err(ToolgateError::Upstream(format!(
                    "server '{}': response channel dropped",
                    self.server_name
                )))
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ToolgateError::Upstream(format!(
                    "server '{}': request '{method}' timed out",
                    self.server_name
                )));
            }
        };

        if let Some(err) = resp.error {
            return Err(ToolgateError::Upstream(format!(
                "server '{}': {method} failed with code {}: {}",
                self.server_name, err.code, err.message
            )));
        }

        resp.result.ok_or_else(|| {
            ToolgateError::Upstream(format!(
                "server '{}': empty {method} result",
                self.server_name
            ))
        })
    }

    async fn initialize(&self) -> ToolgateResult<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "toolgate",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result = self.request("initialize", Some(params)).await?;
        serde_json::from_value(result).map_err(|e| {
            ToolgateError::Upstream(format!(
                "server '{}': bad initialize result: {e}",
                self.server_name
            ))
        })
    }
}

#[async_trait]
impl UpstreamClient for McpClient {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn list_tools(&self) -> ToolgateResult<Vec<McpToolDef>> {
        let result = self.request("tools/list", None).await?;
        let tools = result
            .get("tools")
            .cloned()
            .unwrap_or(serde_json::json!([]));
        serde_json::from_value(tools).map_err(|e| {
            ToolgateError::Enumeration(format!(
                "server '{}': bad tools/list result: {e}",
                self.server_name
            ))
        })
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolgateResult<serde_json::Value> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        self.request("tools/call", Some(params)).await
    }
}
