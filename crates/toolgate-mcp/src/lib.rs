//! MCP transport plumbing: JSON-RPC 2.0 message types and the child-process
//! stdio client.

pub mod client;
pub mod protocol;
pub mod upstream;

pub use client::McpClient;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpToolDef};
pub use upstream::UpstreamClient;
