//! Routes a tool invocation to its backend: an upstream MCP call or the
//! skills executor.

use crate::executor;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use toolgate_core::{ToolgateError, ToolgateResult};
use toolgate_registry::{ToolBackend, ToolRecord, ToolRegistry};

/// Execute a resolved tool record with the given arguments.
///
/// Skill records require the registry so their steps can resolve tools;
/// upstream records call straight through to their client. Errors propagate
/// unchanged.
pub async fn execute_tool(
    tool: &ToolRecord,
    args: Value,
    registry: Option<&ToolRegistry>,
) -> ToolgateResult<Value> {
    let mut chain = Vec::new();
    dispatch(tool, args, registry, &mut chain).await
}

/// Internal dispatch threading the active skill chain, so nested skill
/// invocations can refuse recursion. Boxed because skills re-enter it.
pub(crate) fn dispatch<'a>(
    tool: &'a ToolRecord,
    args: Value,
    registry: Option<&'a ToolRegistry>,
    chain: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = ToolgateResult<Value>> + Send + 'a>> {
    Box::pin(async move {
        match &tool.backend {
            ToolBackend::Skill(skill) => {
                let registry = registry.ok_or_else(|| {
                    ToolgateError::Execution(format!(
                        "skill '{}' requires a registry to execute",
                        skill.name
                    ))
                })?;
                executor::run_skill(skill, &args, registry, chain).await
            }
            ToolBackend::Upstream(client) => client.call_tool(&tool.name, args).await,
        }
    })
}
