//! Upstream server configuration (`mcp-config.json`).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use toolgate_core::{ToolgateError, ToolgateResult};
use tracing::warn;

/// Launch configuration for one upstream server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Load the config file and return the upstream servers in the file's own
/// order — duplicate tool names resolve to the first configured server, so
/// the order is contractual.
///
/// A missing file yields no upstreams (warned, not fatal); an unreadable or
/// invalid file is fatal.
pub async fn load_config(path: &Path) -> ToolgateResult<Vec<(String, ServerConfig)>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, no upstream servers");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(ToolgateError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    parse_config(&raw).map_err(|e| ToolgateError::Config(format!("{}: {e}", path.display())))
}

fn parse_config(raw: &str) -> Result<Vec<(String, ServerConfig)>, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;

    let servers = value
        .get("mcpServers")
        .and_then(|s| s.as_object())
        .ok_or_else(|| "'mcpServers' must be an object".to_string())?;

    let mut result = Vec::with_capacity(servers.len());
    for (name, entry) in servers {
        let config: ServerConfig = serde_json::from_value(entry.clone())
            .map_err(|e| format!("server '{name}': {e}"))?;
        result.push((name.clone(), config));
    }
    Ok(result)
}
