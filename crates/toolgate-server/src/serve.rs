//! Stdio transport for the downstream MCP server: one JSON-RPC message per
//! line on stdin, responses on stdout.

use crate::facade::Facade;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use toolgate_core::ToolgateResult;
use toolgate_mcp::protocol::{error_codes, JsonRpcRequest, JsonRpcResponse};
use tracing::{debug, info, warn};

/// Serve requests from stdin until it closes.
pub async fn serve(facade: Arc<Facade>) -> ToolgateResult<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    info!("serving MCP over stdio");
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            info!("stdin closed, shutting down");
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => {
                debug!(method = %request.method, "request received");
                facade.handle_request(request).await
            }
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                Some(JsonRpcResponse::failure(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("parse error: {e}"),
                ))
            }
        };

        if let Some(response) = response {
            let serialized = serde_json::to_string(&response)?;
            stdout.write_all(serialized.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
}
