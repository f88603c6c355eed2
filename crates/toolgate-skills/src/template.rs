//! `{{var}}` substitution over arbitrarily nested JSON values.

use serde_json::Value;
use std::collections::HashMap;

/// Substitute placeholders in `value` against `context`, returning a fresh
/// structure.
///
/// A string that is exactly one placeholder resolves to the bound value
/// itself, whatever its type. Anywhere else the substitution is textual:
/// bound values are rendered with [`stringify`] and unknown variables are
/// left as literal `{{name}}` text.
pub fn substitute(value: &Value, context: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => substitute_string(s, context),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_string(s: &str, context: &HashMap<String, Value>) -> Value {
    // Whole-string placeholder: the bound value passes through unchanged,
    // preserving arrays, objects, and numbers.
    if s.starts_with("{{") && s.ends_with("}}") && s.len() >= 4 && !s[2..].contains("{{") {
        let name = s[2..s.len() - 2].trim();
        if let Some(bound) = context.get(name) {
            return bound.clone();
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match context.get(name) {
                    Some(bound) => out.push_str(&stringify(bound)),
                    // Undefined variables survive literally.
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

/// Textual rendering of a bound value: strings pass through, arrays join
/// their rendered elements with commas, objects render as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
