//! Declarative skill definitions: multi-step tool macros loaded from YAML.

use serde::{Deserialize, Serialize};

/// One step of a skill: a tool invocation with templated arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillStep {
    /// Tool name to invoke.
    pub tool: String,
    /// Upstream server the tool lives on. When absent, the first registered
    /// tool with a matching name is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Arguments, possibly nested, containing `{{var}}` placeholders.
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
    /// Context variable the step result is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn empty_args() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// A named sequence of steps exposed as a single tool on the synthetic
/// `internal` server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema `properties` for the skill's arguments.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub steps: Vec<SkillStep>,
}

impl SkillDefinition {
    /// Synthesise the JSON-Schema object describing the skill's arguments.
    ///
    /// Parameters carrying `"required": true` are listed in the schema's
    /// `required` array; the marker itself is not emitted.
    pub fn input_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, property) in &self.parameters {
            let mut property = property.clone();
            if let Some(obj) = property.as_object_mut() {
                if obj.remove("required") == Some(serde_json::Value::Bool(true)) {
                    required.push(serde_json::Value::String(name.clone()));
                }
            }
            properties.insert(name.clone(), property);
        }

        let mut schema = serde_json::Map::new();
        schema.insert("type".into(), "object".into());
        schema.insert("properties".into(), serde_json::Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), serde_json::Value::Array(required));
        }
        serde_json::Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_schema_basic() {
        let skill: SkillDefinition = serde_json::from_value(json!({
            "name": "greet",
            "description": "Greets someone",
            "parameters": {
                "who": {"type": "string", "description": "Name to greet"}
            },
            "steps": [{"tool": "echo", "args": {"message": "hi {{who}}"}}]
        }))
        .unwrap();

        let schema = skill.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["who"]["type"], "string");
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn test_input_schema_required_marker() {
        let skill: SkillDefinition = serde_json::from_value(json!({
            "name": "fetch",
            "description": "Fetch a URL",
            "parameters": {
                "url": {"type": "string", "required": true},
                "timeout": {"type": "number"}
            },
            "steps": [{"tool": "http_get", "args": {"url": "{{url}}"}}]
        }))
        .unwrap();

        let schema = skill.input_schema();
        assert_eq!(schema["required"], json!(["url"]));
        assert!(schema["properties"]["url"].get("required").is_none());
    }

    #[test]
    fn test_step_defaults() {
        let step: SkillStep = serde_yaml::from_str("tool: echo").unwrap();
        assert_eq!(step.tool, "echo");
        assert!(step.server.is_none());
        assert!(step.args.is_object());
        assert!(step.result_var.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed: Result<SkillStep, _> = serde_yaml::from_str("tool: echo\nbogus: 1");
        assert!(parsed.is_err());
    }
}
