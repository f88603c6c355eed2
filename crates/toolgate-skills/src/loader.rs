//! Skill file loading and strict structural validation.

use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::path::Path;
use toolgate_core::{SkillDefinition, ToolgateError, ToolgateResult};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SkillsFile {
    skills: Vec<SkillDefinition>,
}

/// Load and validate a skills YAML file.
///
/// A missing file propagates as an IO error — the caller decides whether
/// absence is fatal. A present but malformed file fails with one aggregated
/// error listing every structural problem.
pub async fn load_skills(path: &Path) -> ToolgateResult<Vec<SkillDefinition>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let skills = parse_skills(&raw)
        .map_err(|e| ToolgateError::Skills(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), skills = skills.len(), "skills loaded");
    Ok(skills)
}

/// Parse a skills document, collecting all structural problems into a single
/// error message.
pub fn parse_skills(raw: &str) -> Result<Vec<SkillDefinition>, String> {
    let value: YamlValue =
        serde_yaml::from_str(raw).map_err(|e| format!("invalid YAML: {e}"))?;

    let issues = validate_structure(&value);
    if !issues.is_empty() {
        return Err(format!(
            "{} structural problem(s): {}",
            issues.len(),
            issues.join("; ")
        ));
    }

    let file: SkillsFile =
        serde_yaml::from_value(value).map_err(|e| format!("invalid skill definition: {e}"))?;
    Ok(file.skills)
}

fn validate_structure(value: &YamlValue) -> Vec<String> {
    let mut issues = Vec::new();

    let root = match value.as_mapping() {
        Some(root) => root,
        None => return vec!["document must be a mapping with a 'skills' list".to_string()],
    };
    let skills = match root.get("skills").and_then(|s| s.as_sequence()) {
        Some(skills) => skills,
        None => return vec!["'skills' must be a list".to_string()],
    };

    let mut seen_names: Vec<&str> = Vec::new();
    for (i, skill) in skills.iter().enumerate() {
        let label = skill
            .as_mapping()
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .map(|n| format!("skill '{n}'"))
            .unwrap_or_else(|| format!("skill #{}", i + 1));

        let mapping = match skill.as_mapping() {
            Some(mapping) => mapping,
            None => {
                issues.push(format!("{label}: must be a mapping"));
                continue;
            }
        };

        match mapping.get("name").and_then(|n| n.as_str()) {
            Some(name) if !name.trim().is_empty() => {
                if seen_names.contains(&name) {
                    issues.push(format!("{label}: duplicate skill name"));
                }
                seen_names.push(name);
            }
            _ => issues.push(format!("{label}: 'name' must be a non-empty string")),
        }
        if mapping.get("description").and_then(|d| d.as_str()).is_none() {
            issues.push(format!("{label}: 'description' must be a string"));
        }
        if let Some(params) = mapping.get("parameters") {
            if !params.is_mapping() {
                issues.push(format!("{label}: 'parameters' must be a mapping"));
            }
        }

        match mapping.get("steps").and_then(|s| s.as_sequence()) {
            Some(steps) if !steps.is_empty() => {
                for (j, step) in steps.iter().enumerate() {
                    validate_step(&label, j, step, &mut issues);
                }
            }
            _ => issues.push(format!("{label}: 'steps' must be a non-empty list")),
        }
    }

    issues
}

fn validate_step(label: &str, index: usize, step: &YamlValue, issues: &mut Vec<String>) {
    let mapping = match step.as_mapping() {
        Some(mapping) => mapping,
        None => {
            issues.push(format!("{label} step {}: must be a mapping", index + 1));
            return;
        }
    };

    match mapping.get("tool").and_then(|t| t.as_str()) {
        Some(tool) if !tool.trim().is_empty() => {}
        _ => issues.push(format!(
            "{label} step {}: 'tool' must be a non-empty string",
            index + 1
        )),
    }
    if let Some(server) = mapping.get("server") {
        if !server.is_string() {
            issues.push(format!("{label} step {}: 'server' must be a string", index + 1));
        }
    }
    if let Some(args) = mapping.get("args") {
        if !args.is_mapping() {
            issues.push(format!("{label} step {}: 'args' must be a mapping", index + 1));
        }
    }
    if let Some(result_var) = mapping.get("result_var") {
        if !result_var.is_string() {
            issues.push(format!(
                "{label} step {}: 'result_var' must be a string",
                index + 1
            ));
        }
    }
}
