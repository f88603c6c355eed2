//! The registry's unit: one tool record per `(server, name)` pair.

use std::sync::Arc;
use toolgate_core::text::{extract_keywords, normalize, tokenize};
use toolgate_core::SkillDefinition;
use toolgate_mcp::UpstreamClient;

/// Reserved server name for tools synthesised from skills.
pub const INTERNAL_SERVER: &str = "internal";

/// Where a tool's execution lands.
#[derive(Clone)]
pub enum ToolBackend {
    /// Proxied to a live upstream MCP client.
    Upstream(Arc<dyn UpstreamClient>),
    /// Interpreted by the skills executor.
    Skill(Arc<SkillDefinition>),
}

/// A tool known to the registry, with its pre-computed search material.
#[derive(Clone)]
pub struct ToolRecord {
    pub server: String,
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the tool's arguments.
    pub schema: serde_json::Value,
    /// Space-joined lexical tokens derived from name, description, and
    /// schema properties. Computed once at insertion.
    pub schema_keywords: String,
    /// `normalize(name + " " + description + " " + schema_keywords)`,
    /// cached for the ranking passes.
    pub normalized_text: String,
    /// L2-normalised vector; absent when vector mode is off or generation
    /// failed.
    pub embedding: Option<Vec<f32>>,
    pub backend: ToolBackend,
}

impl ToolRecord {
    pub fn new(
        server: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        backend: ToolBackend,
    ) -> Self {
        let server = server.into();
        let name = name.into();
        let description = description.into();
        let schema_keywords = derive_schema_keywords(&name, &description, &schema);
        let normalized_text = normalize(&format!("{name} {description} {schema_keywords}"));
        Self {
            server,
            name,
            description,
            schema,
            schema_keywords,
            normalized_text,
            embedding: None,
            backend,
        }
    }

    pub fn with_embedding(mut self, embedding: Option<Vec<f32>>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn is_skill(&self) -> bool {
        matches!(self.backend, ToolBackend::Skill(_))
    }

    pub fn upstream(&self) -> Option<&Arc<dyn UpstreamClient>> {
        match &self.backend {
            ToolBackend::Upstream(client) => Some(client),
            ToolBackend::Skill(_) => None,
        }
    }

    pub fn skill(&self) -> Option<&Arc<SkillDefinition>> {
        match &self.backend {
            ToolBackend::Skill(skill) => Some(skill),
            ToolBackend::Upstream(_) => None,
        }
    }

    /// The text fed to the embedding model.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.name, self.description)
    }
}

/// Lexical tokens for a tool: name pieces, long description words, schema
/// property names, and long words from property descriptions.
fn derive_schema_keywords(name: &str, description: &str, schema: &serde_json::Value) -> String {
    let mut keywords = extract_keywords(name, Some(description));
    let mut push = |word: String| {
        if !word.is_empty() && !keywords.contains(&word) {
            keywords.push(word);
        }
    };

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (prop_name, prop) in properties {
            push(prop_name.to_lowercase());
            if let Some(desc) = prop.get("description").and_then(|d| d.as_str()) {
                for token in tokenize(desc, 4) {
                    push(token);
                }
            }
        }
    }
    keywords.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dummy_skill() -> Arc<SkillDefinition> {
        Arc::new(
            serde_json::from_value(json!({
                "name": "noop",
                "description": "Does nothing",
                "steps": [{"tool": "echo"}]
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_schema_keywords_include_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "city": {"type": "string", "description": "Target city for the forecast"},
                "units": {"type": "string"}
            }
        });
        let record = ToolRecord::new(
            "weather",
            "get_weather",
            "Fetches the current weather",
            schema,
            ToolBackend::Skill(dummy_skill()),
        );

        for expected in ["get_weather", "weather", "city", "units", "forecast", "target"] {
            assert!(
                record.schema_keywords.split(' ').any(|k| k == expected),
                "missing keyword {expected} in {}",
                record.schema_keywords
            );
        }
    }

    #[test]
    fn test_normalized_text_matches_normalize() {
        let record = ToolRecord::new(
            "files",
            "read_file",
            "Reads a file from disk.",
            json!({"type": "object", "properties": {}}),
            ToolBackend::Skill(dummy_skill()),
        );
        let expected = toolgate_core::text::normalize(&format!(
            "{} {} {}",
            record.name, record.description, record.schema_keywords
        ));
        assert_eq!(record.normalized_text, expected);
    }

    #[test]
    fn test_is_skill_discriminant() {
        let record = ToolRecord::new(
            INTERNAL_SERVER,
            "macro",
            "A skill",
            json!({"type": "object"}),
            ToolBackend::Skill(dummy_skill()),
        );
        assert!(record.is_skill());
        assert!(record.skill().is_some());
        assert!(record.upstream().is_none());
    }
}
