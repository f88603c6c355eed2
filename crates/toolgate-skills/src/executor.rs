//! Skill execution: per-step tool resolution, templated argument
//! substitution, and result binding.

use crate::dispatch;
use crate::template::substitute;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use toolgate_core::{SkillDefinition, SkillStep, ToolgateError, ToolgateResult};
use toolgate_registry::{ToolRecord, ToolRegistry};
use tracing::{debug, warn};

/// Run a skill against the caller's arguments.
///
/// The context starts as a copy of `args` (the caller's mapping is never
/// mutated) and grows as steps bind their results. The raw result of the
/// final step is returned so the outer MCP response shape is preserved.
pub async fn execute_skill(
    skill: &SkillDefinition,
    args: &Value,
    registry: &ToolRegistry,
) -> ToolgateResult<Value> {
    let mut chain = Vec::new();
    run_skill(skill, args, registry, &mut chain).await
}

/// Skill body shared with the dispatcher, carrying the active call chain.
/// A skill already on the chain is refused rather than recursed into.
pub(crate) async fn run_skill(
    skill: &SkillDefinition,
    args: &Value,
    registry: &ToolRegistry,
    chain: &mut Vec<String>,
) -> ToolgateResult<Value> {
    if chain.iter().any(|name| name == &skill.name) {
        return Err(ToolgateError::Execution(format!(
            "recursive skill invocation: {} -> {}",
            chain.join(" -> "),
            skill.name
        )));
    }
    chain.push(skill.name.clone());
    let result = run_steps(skill, args, registry, chain).await;
    chain.pop();
    result
}

async fn run_steps(
    skill: &SkillDefinition,
    args: &Value,
    registry: &ToolRegistry,
    chain: &mut Vec<String>,
) -> ToolgateResult<Value> {
    let mut context: HashMap<String, Value> = match args {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Null => HashMap::new(),
        other => {
            warn!(skill = %skill.name, "non-object skill arguments ignored: {other}");
            HashMap::new()
        }
    };

    let mut last_result = Value::Null;
    for (i, step) in skill.steps.iter().enumerate() {
        debug!(skill = %skill.name, step = i + 1, tool = %step.tool, "executing skill step");

        let step_args = substitute(&step.args, &context);
        let record = resolve_step_tool(step, registry).await?;
        let result = dispatch::dispatch(&record, step_args, Some(registry), chain).await?;

        if let Some(var) = &step.result_var {
            context.insert(var.clone(), bind_result(&result));
        }
        last_result = result;
    }
    Ok(last_result)
}

/// Resolve the tool a step refers to. A qualified step looks up its exact
/// server; an unqualified one takes the first record with a matching name,
/// warning when the name is ambiguous.
async fn resolve_step_tool(
    step: &SkillStep,
    registry: &ToolRegistry,
) -> ToolgateResult<Arc<ToolRecord>> {
    if let Some(server) = &step.server {
        return registry
            .get_tool(server, &step.tool)
            .await
            .ok_or_else(|| ToolgateError::ToolNotFound {
                tool: step.tool.clone(),
                server: server.clone(),
            });
    }

    let mut candidates = registry.find_by_name(&step.tool).await;
    if candidates.is_empty() {
        return Err(ToolgateError::ToolNotFound {
            tool: step.tool.clone(),
            server: "any".to_string(),
        });
    }
    if candidates.len() > 1 {
        warn!(
            tool = %step.tool,
            server = %candidates[0].server,
            candidates = candidates.len(),
            "ambiguous tool name, using first registered server"
        );
    }
    Ok(candidates.swap_remove(0))
}

/// Value bound to a step's `result_var`: the first text content block if the
/// result has MCP content shape, otherwise the whole result.
fn bind_result(result: &Value) -> Value {
    if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        let text = content
            .iter()
            .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .and_then(|block| block.get("text"))
            .and_then(|t| t.as_str());
        if let Some(text) = text {
            return Value::String(text.to_string());
        }
    }
    result.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::execute_tool;
    use async_trait::async_trait;
    use serde_json::json;
    use toolgate_embed::{EmbeddingService, HashedTextModel, DEFAULT_DIMENSION};
    use toolgate_mcp::protocol::McpToolDef;
    use toolgate_mcp::UpstreamClient;

    struct MockServer {
        name: String,
        tools: Vec<McpToolDef>,
    }

    #[async_trait]
    impl UpstreamClient for MockServer {
        fn server_name(&self) -> &str {
            &self.name
        }

        async fn list_tools(&self) -> ToolgateResult<Vec<McpToolDef>> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, args: Value) -> ToolgateResult<Value> {
            match name {
                "echo" => {
                    let message = args.get("message").and_then(|m| m.as_str()).unwrap_or("");
                    Ok(json!({
                        "content": [{"type": "text", "text": format!("Echo: {message}")}]
                    }))
                }
                "upper" => {
                    let text = args.get("text").and_then(|t| t.as_str()).unwrap_or("");
                    Ok(json!({
                        "content": [{"type": "text", "text": text.to_uppercase()}]
                    }))
                }
                "raw_stats" => Ok(json!({"total": 7, "unit": "files"})),
                "boom" => Err(ToolgateError::Execution("upstream exploded".to_string())),
                other => Err(ToolgateError::ToolNotFound {
                    tool: other.to_string(),
                    server: self.name.clone(),
                }),
            }
        }
    }

    fn tool_def(name: &str) -> McpToolDef {
        McpToolDef {
            name: name.to_string(),
            description: format!("Mock tool {name}"),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn registry() -> ToolRegistry {
        let service = EmbeddingService::with_model(
            Arc::new(HashedTextModel::new("test", DEFAULT_DIMENSION)),
            std::env::temp_dir().join("toolgate-skills-tests"),
        );
        let registry = ToolRegistry::new(Arc::new(service), false);
        registry
            .register_tools_from_client(
                "mock",
                Arc::new(MockServer {
                    name: "mock".to_string(),
                    tools: vec![
                        tool_def("echo"),
                        tool_def("upper"),
                        tool_def("raw_stats"),
                        tool_def("boom"),
                    ],
                }),
                None,
            )
            .await
            .unwrap();
        registry
    }

    fn skill(value: Value) -> SkillDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn text_of(result: &Value) -> &str {
        result["content"][0]["text"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_full_substitution() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "say",
            "description": "Echo the input",
            "parameters": {"input": {"type": "string"}},
            "steps": [{"tool": "echo", "args": {"message": "{{input}}"}}]
        }));

        let result = execute_skill(&skill, &json!({"input": "Hello"}), &registry)
            .await
            .unwrap();
        assert_eq!(text_of(&result), "Echo: Hello");
    }

    #[tokio::test]
    async fn test_chaining_through_result_var() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "shout",
            "description": "Echo then uppercase",
            "parameters": {"input": {"type": "string"}},
            "steps": [
                {"tool": "echo", "args": {"message": "{{input}}"}, "result_var": "echoed"},
                {"tool": "upper", "args": {"text": "{{echoed}}"}}
            ]
        }));

        let result = execute_skill(&skill, &json!({"input": "test"}), &registry)
            .await
            .unwrap();
        assert_eq!(text_of(&result), "ECHO: TEST");
    }

    #[tokio::test]
    async fn test_partial_substitution() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "wrap",
            "description": "Echo with decoration",
            "parameters": {"val": {"type": "string"}},
            "steps": [{"tool": "echo", "args": {"message": "Prefix {{val}} Suffix"}}]
        }));

        let result = execute_skill(&skill, &json!({"val": "Middle"}), &registry)
            .await
            .unwrap();
        assert_eq!(text_of(&result), "Echo: Prefix Middle Suffix");
    }

    #[tokio::test]
    async fn test_caller_args_not_mutated() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "bind",
            "description": "Binds a result",
            "parameters": {},
            "steps": [{"tool": "echo", "args": {"message": "x"}, "result_var": "input"}]
        }));

        let args = json!({"input": "original"});
        execute_skill(&skill, &args, &registry).await.unwrap();
        assert_eq!(args, json!({"input": "original"}));
    }

    #[tokio::test]
    async fn test_result_var_binds_whole_object_without_text_content() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "stats",
            "description": "Raw result then echo",
            "parameters": {},
            "steps": [
                {"tool": "raw_stats", "args": {}, "result_var": "stats"},
                {"tool": "echo", "args": {"message": "{{stats}}"}}
            ]
        }));

        let result = execute_skill(&skill, &json!({}), &registry).await.unwrap();
        assert_eq!(text_of(&result), r#"Echo: {"total":7,"unit":"files"}"#);
    }

    #[tokio::test]
    async fn test_qualified_tool_not_found() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "missing",
            "description": "Targets the wrong server",
            "parameters": {},
            "steps": [{"tool": "echo", "server": "nowhere", "args": {}}]
        }));

        let err = execute_skill(&skill, &json!({}), &registry).await.unwrap_err();
        match err {
            ToolgateError::ToolNotFound { tool, server } => {
                assert_eq!(tool, "echo");
                assert_eq!(server, "nowhere");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_step_failure_aborts_skill() {
        let registry = registry().await;
        let skill = skill(json!({
            "name": "fragile",
            "description": "Fails mid-way",
            "parameters": {},
            "steps": [
                {"tool": "boom", "args": {}},
                {"tool": "echo", "args": {"message": "never reached"}}
            ]
        }));

        let err = execute_skill(&skill, &json!({}), &registry).await.unwrap_err();
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_ambiguous_name_uses_first_registered() {
        let registry = registry().await;
        registry
            .register_tools_from_client(
                "second",
                Arc::new(MockServer {
                    name: "second".to_string(),
                    tools: vec![tool_def("echo")],
                }),
                None,
            )
            .await
            .unwrap();

        let skill = skill(json!({
            "name": "ambiguous",
            "description": "Unqualified echo",
            "parameters": {},
            "steps": [{"tool": "echo", "args": {"message": "hi"}}]
        }));

        // The first registered server ("mock") answers.
        let result = execute_skill(&skill, &json!({}), &registry).await.unwrap();
        assert_eq!(text_of(&result), "Echo: hi");
    }

    #[tokio::test]
    async fn test_recursive_skill_refused() {
        let registry = registry().await;
        registry
            .register_skill(skill(json!({
                "name": "ouroboros",
                "description": "Calls itself",
                "parameters": {},
                "steps": [{"tool": "ouroboros", "server": "internal", "args": {}}]
            })))
            .await
            .unwrap();

        let record = registry.get_tool("internal", "ouroboros").await.unwrap();
        let err = execute_tool(&record, json!({}), Some(&registry))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("recursive skill invocation"));
    }

    #[tokio::test]
    async fn test_skill_invoking_skill() {
        let registry = registry().await;
        registry
            .register_skill(skill(json!({
                "name": "inner",
                "description": "Echoes a fixed message",
                "parameters": {},
                "steps": [{"tool": "echo", "args": {"message": "from inner"}}]
            })))
            .await
            .unwrap();

        let outer = skill(json!({
            "name": "outer",
            "description": "Delegates to the inner skill",
            "parameters": {},
            "steps": [{"tool": "inner", "server": "internal", "args": {}}]
        }));

        let result = execute_skill(&outer, &json!({}), &registry).await.unwrap();
        assert_eq!(text_of(&result), "Echo: from inner");
    }

    #[tokio::test]
    async fn test_dispatch_upstream_directly() {
        let registry = registry().await;
        let record = registry.get_tool("mock", "echo").await.unwrap();
        let result = execute_tool(&record, json!({"message": "direct"}), None)
            .await
            .unwrap();
        assert_eq!(text_of(&result), "Echo: direct");
    }
}
