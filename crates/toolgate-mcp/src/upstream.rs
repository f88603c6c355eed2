//! Seam between the registry/dispatcher and the concrete MCP transport.

use crate::protocol::McpToolDef;
use async_trait::async_trait;
use toolgate_core::ToolgateResult;

/// A live connection to an upstream MCP server.
///
/// Implemented by [`crate::client::McpClient`]; tests substitute in-memory
/// stubs.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    fn server_name(&self) -> &str;

    /// Enumerate the server's tools (`tools/list`).
    async fn list_tools(&self) -> ToolgateResult<Vec<McpToolDef>>;

    /// Invoke a tool (`tools/call`) and return the raw result object.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolgateResult<serde_json::Value>;
}
