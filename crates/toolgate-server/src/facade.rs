//! The public MCP surface: exactly two tools, `search_tools` and
//! `call_tool`, in front of the whole catalogue.

use serde_json::{json, Value};
use std::sync::Arc;
use toolgate_core::SearchMode;
use toolgate_mcp::protocol::{error_codes, JsonRpcRequest, JsonRpcResponse};
use toolgate_registry::ToolRegistry;
use toolgate_search::SearchEngine;
use toolgate_skills::execute_tool;
use tracing::{debug, info};

/// Default number of hits returned by `search_tools`.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Downstream request handler owning the registry and the search engine.
pub struct Facade {
    registry: Arc<ToolRegistry>,
    search: SearchEngine,
}

impl Facade {
    pub fn new(registry: Arc<ToolRegistry>, mode: SearchMode) -> Self {
        let search = SearchEngine::new(registry.clone(), mode);
        Self { registry, search }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The two tool definitions this server exposes.
    pub fn tool_definitions() -> Value {
        json!([
            {
                "name": "search_tools",
                "description": "Search the aggregated tool catalogue by natural-language query. \
                    Returns the most relevant tools with their servers and input schemas.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What you want a tool to do, e.g. 'resize an image'"
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of results (default 5)"
                        }
                    },
                    "required": ["query"]
                }
            },
            {
                "name": "call_tool",
                "description": "Invoke a tool found via search_tools on its upstream server.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "server": {"type": "string", "description": "Server the tool belongs to"},
                        "toolName": {"type": "string", "description": "Name of the tool to invoke"},
                        "arguments": {"type": "object", "description": "Arguments for the tool"}
                    },
                    "required": ["server", "toolName"]
                }
            }
        ])
    }

    /// Handle one JSON-RPC request. Notifications yield no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "notification received");
            return None;
        }
        let id = request.id;

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "toolgate",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::success(id, json!({"tools": Self::tool_definitions()}))
            }
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                match name {
                    "search_tools" => {
                        JsonRpcResponse::success(id, self.search_tools(&arguments).await)
                    }
                    "call_tool" => JsonRpcResponse::success(id, self.call_tool(&arguments).await),
                    other => JsonRpcResponse::failure(
                        id,
                        error_codes::INVALID_PARAMS,
                        format!("unknown tool: {other}"),
                    ),
                }
            }
            other => JsonRpcResponse::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("unsupported method: {other}"),
            ),
        };
        Some(response)
    }

    async fn search_tools(&self, arguments: &Value) -> Value {
        let query = match arguments.get("query").and_then(|q| q.as_str()) {
            Some(query) if !query.trim().is_empty() => query,
            _ => return error_result("search_tools requires a non-empty 'query' string"),
        };
        let limit = arguments
            .get("limit")
            .and_then(|l| l.as_u64())
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_SEARCH_LIMIT);

        match self.search.search_tools(query, limit).await {
            Ok(records) => {
                info!(query = %query, hits = records.len(), "search_tools");
                let listing: Vec<Value> = records
                    .iter()
                    .map(|record| {
                        json!({
                            "name": record.name,
                            "description": record.description,
                            "server": record.server,
                            "inputSchema": record.schema,
                        })
                    })
                    .collect();

                let rendered =
                    serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "[]".to_string());
                let text = if records.is_empty() {
                    format!(
                        "No tools matched \"{query}\". Try a shorter or more general query, \
                         or different wording."
                    )
                } else {
                    format!(
                        "Found {} tool(s) for \"{query}\":\n\n{rendered}\n\n\
                         Call one with call_tool using its server and name. If none of these \
                         fit, refine the query and search again.",
                        records.len()
                    )
                };
                json!({"content": [{"type": "text", "text": text}]})
            }
            Err(e) => error_result(format!("search failed: {e}")),
        }
    }

    async fn call_tool(&self, arguments: &Value) -> Value {
        let server = arguments.get("server").and_then(|s| s.as_str()).unwrap_or("");
        let tool_name = arguments
            .get("toolName")
            .and_then(|t| t.as_str())
            .unwrap_or("");
        if server.is_empty() || tool_name.is_empty() {
            return error_result("call_tool requires 'server' and 'toolName' strings");
        }
        let tool_args = arguments.get("arguments").cloned().unwrap_or(json!({}));

        let record = match self.registry.get_tool(server, tool_name).await {
            Some(record) => record,
            None => {
                return error_result(format!("Tool '{tool_name}' not found on server '{server}'"))
            }
        };

        info!(server = %server, tool = %tool_name, "call_tool");
        match execute_tool(&record, tool_args, Some(&self.registry)).await {
            Ok(result) => result,
            Err(e) => error_result(e.to_string()),
        }
    }
}

fn error_result(message: impl Into<String>) -> Value {
    json!({
        "isError": true,
        "content": [{"type": "text", "text": message.into()}]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use toolgate_core::ToolgateResult;
    use toolgate_embed::{EmbeddingService, HashedTextModel, DEFAULT_DIMENSION};
    use toolgate_mcp::protocol::McpToolDef;
    use toolgate_mcp::UpstreamClient;

    struct MockServer;

    #[async_trait]
    impl UpstreamClient for MockServer {
        fn server_name(&self) -> &str {
            "mock"
        }

        async fn list_tools(&self) -> ToolgateResult<Vec<McpToolDef>> {
            Ok(vec![
                McpToolDef {
                    name: "get_weather".to_string(),
                    description: "Fetches the current weather for a city".to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {"city": {"type": "string"}}
                    }),
                },
                McpToolDef {
                    name: "echo".to_string(),
                    description: "Echoes a message".to_string(),
                    input_schema: json!({"type": "object", "properties": {}}),
                },
            ])
        }

        async fn call_tool(&self, name: &str, args: Value) -> ToolgateResult<Value> {
            let message = args.get("message").and_then(|m| m.as_str()).unwrap_or("");
            Ok(json!({
                "content": [{"type": "text", "text": format!("{name}: {message}")}]
            }))
        }
    }

    async fn facade() -> Facade {
        let service = EmbeddingService::with_model(
            Arc::new(HashedTextModel::new("test", DEFAULT_DIMENSION)),
            std::env::temp_dir().join("toolgate-server-tests"),
        );
        let registry = Arc::new(ToolRegistry::new(Arc::new(service), false));
        registry
            .register_tools_from_client("mock", Arc::new(MockServer), None)
            .await
            .unwrap();
        Facade::new(registry, SearchMode::Fuse)
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, Some(params))
    }

    #[tokio::test]
    async fn test_initialize() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request("initialize", json!({})))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "toolgate");
    }

    #[tokio::test]
    async fn test_tools_list_exposes_exactly_two() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request("tools/list", json!({})))
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 2);
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"search_tools"));
        assert!(names.contains(&"call_tool"));
    }

    #[tokio::test]
    async fn test_search_tools_returns_listing() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request(
                "tools/call",
                json!({"name": "search_tools", "arguments": {"query": "weather"}}),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("get_weather"));
        assert!(text.contains("\"server\": \"mock\""));
        assert!(text.contains("refine the query"));
    }

    #[tokio::test]
    async fn test_search_tools_no_hits() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request(
                "tools/call",
                json!({"name": "search_tools", "arguments": {"query": "xylophone tuning"}}),
            ))
            .await
            .unwrap();
        let text = resp.result.unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(text.contains("No tools matched"));
    }

    #[tokio::test]
    async fn test_search_tools_missing_query() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request(
                "tools/call",
                json!({"name": "search_tools", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.result.unwrap()["isError"], true);
    }

    #[tokio::test]
    async fn test_call_tool_passes_result_verbatim() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request(
                "tools/call",
                json!({
                    "name": "call_tool",
                    "arguments": {
                        "server": "mock",
                        "toolName": "echo",
                        "arguments": {"message": "hi"}
                    }
                }),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["content"][0]["text"], "echo: hi");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_call_tool_not_found() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request(
                "tools/call",
                json!({
                    "name": "call_tool",
                    "arguments": {"server": "mock", "toolName": "missing"}
                }),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("not found"));
    }

    #[tokio::test]
    async fn test_unknown_facade_tool() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request("tools/call", json!({"name": "other_tool"})))
            .await
            .unwrap();
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let facade = facade().await;
        let resp = facade
            .handle_request(request("resources/list", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let facade = facade().await;
        let req = JsonRpcRequest::notification("notifications/initialized", None);
        assert!(facade.handle_request(req).await.is_none());
    }
}
