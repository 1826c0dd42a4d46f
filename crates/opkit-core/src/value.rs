//! Generic attribute trees
//!
//! Objects without a typed representation are carried as JSON trees.
//! YAML allows non-string mapping keys (`1: a`, `true: b`, `~: c`); those are
//! stringified here, once, when the tree is built, so everything downstream
//! only ever sees string-keyed mappings.

use serde_json::{Map, Number, Value as JsonValue};
use serde_yaml::Value as YamlValue;

use crate::error::{CoreError, Result};

/// Convert a YAML value into a JSON tree with string keys at every level
///
/// Mapping order is preserved. Tags are dropped in favour of the tagged
/// value. Non-finite floats become their YAML spelling as strings.
pub fn normalize_yaml(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => normalize_number(&n),
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => {
            JsonValue::Array(items.into_iter().map(normalize_yaml).collect())
        }
        YamlValue::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(key_to_string(key), normalize_yaml(value));
            }
            JsonValue::Object(map)
        }
        YamlValue::Tagged(tagged) => normalize_yaml(tagged.value),
    }
}

/// Parse one YAML document as a generic string-keyed mapping
///
/// Fails when the text is not YAML or when its root is not a mapping.
pub fn parse_generic(body: &str, source_name: Option<&str>) -> Result<Map<String, JsonValue>> {
    let mut value: YamlValue = serde_yaml::from_str(body)
        .map_err(|e| CoreError::manifest(source_name, format!("invalid YAML: {}", e)))?;
    value
        .apply_merge()
        .map_err(|e| CoreError::manifest(source_name, format!("invalid merge key: {}", e)))?;

    match normalize_yaml(value) {
        JsonValue::Object(map) => Ok(map),
        other => Err(CoreError::manifest(
            source_name,
            format!("document root must be a mapping, found {}", json_type_name(&other)),
        )),
    }
}

fn normalize_number(n: &serde_yaml::Number) -> JsonValue {
    if let Some(i) = n.as_i64() {
        JsonValue::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        JsonValue::Number(u.into())
    } else {
        let f = n.as_f64().unwrap_or(f64::NAN);
        Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(n.to_string()))
    }
}

fn key_to_string(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Tagged(tagged) => key_to_string(tagged.value),
        complex @ (YamlValue::Sequence(_) | YamlValue::Mapping(_)) => {
            normalize_yaml(complex).to_string()
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "an empty document",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}
