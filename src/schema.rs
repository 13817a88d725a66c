//! JSON Schema sanitizing for structured output.
//!
//! Structured-output endpoints accept a narrow subset of JSON Schema. Rather
//! than rejecting schemas that use more, we strip them down to the subset:
//! only `type`, `properties`, `required` and `items` survive, and every
//! object node is closed with `additionalProperties: false`.

use serde_json::{Map, Value};

const KEPT_KEYS: &[&str] = &["type", "properties", "required", "items"];

/// Where a structured-output schema comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    /// Schema as JSON text, parsed when the request is built.
    Json(String),
    /// Schema that is already a JSON value.
    Value(Value),
}

impl SchemaSource {
    /// Parse the schema into a JSON value.
    pub fn resolve(&self) -> Result<Value, serde_json::Error> {
        match self {
            SchemaSource::Json(text) => serde_json::from_str(text),
            SchemaSource::Value(value) => Ok(value.clone()),
        }
    }
}

impl From<&str> for SchemaSource {
    fn from(text: &str) -> Self {
        SchemaSource::Json(text.to_string())
    }
}

impl From<String> for SchemaSource {
    fn from(text: String) -> Self {
        SchemaSource::Json(text)
    }
}

impl From<Value> for SchemaSource {
    fn from(value: Value) -> Self {
        SchemaSource::Value(value)
    }
}

/// Reduce `schema` to the subset structured output accepts.
///
/// Never fails: unknown keys are dropped and non-object values come back
/// unchanged.
pub fn sanitize(schema: &Value) -> Value {
    let Value::Object(node) = schema else {
        return schema.clone();
    };

    let mut out = Map::new();
    for key in KEPT_KEYS {
        let Some(value) = node.get(*key) else {
            continue;
        };
        let cleaned = match *key {
            "properties" => Value::Object(sanitize_properties(value)),
            "items" => sanitize(value),
            _ => value.clone(),
        };
        out.insert((*key).to_string(), cleaned);
    }

    if node.get("type").and_then(Value::as_str) == Some("object") {
        out.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    Value::Object(out)
}

fn sanitize_properties(properties: &Value) -> Map<String, Value> {
    match properties {
        Value::Object(props) => props
            .iter()
            .map(|(name, schema)| (name.clone(), sanitize(schema)))
            .collect(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Person",
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1, "description": "Full name"},
                "age": {"type": "integer", "minimum": 0},
                "tags": {
                    "type": "array",
                    "maxItems": 5,
                    "items": {"type": "string", "pattern": "^[a-z]+$"}
                },
                "address": {
                    "type": "object",
                    "properties": {"city": {"type": "string", "format": "city"}},
                    "required": ["city"]
                }
            },
            "required": ["name", "age"]
        })
    }

    #[test]
    fn drops_unsupported_keys() {
        let clean = sanitize(&person_schema());
        assert_eq!(
            clean,
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "integer"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "address": {
                        "type": "object",
                        "properties": {"city": {"type": "string"}},
                        "required": ["city"],
                        "additionalProperties": false
                    }
                },
                "required": ["name", "age"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn is_idempotent() {
        let once = sanitize(&person_schema());
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn closes_objects_nested_in_arrays() {
        let schema = json!({
            "type": "array",
            "items": {"type": "object", "properties": {"id": {"type": "integer"}}}
        });
        let clean = sanitize(&schema);
        assert_eq!(clean["items"]["additionalProperties"], false);
        assert!(clean.get("additionalProperties").is_none());
    }

    #[test]
    fn overrides_caller_additional_properties() {
        let schema = json!({"type": "object", "additionalProperties": true});
        assert_eq!(sanitize(&schema)["additionalProperties"], false);
    }

    #[test]
    fn non_objects_pass_through() {
        assert_eq!(sanitize(&json!("string")), json!("string"));
        assert_eq!(sanitize(&json!(42)), json!(42));
        assert_eq!(sanitize(&Value::Null), Value::Null);
        assert_eq!(sanitize(&json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn malformed_properties_become_empty() {
        let schema = json!({"type": "object", "properties": "oops"});
        assert_eq!(sanitize(&schema)["properties"], json!({}));
    }

    #[test]
    fn schema_source_from_text() {
        let source = SchemaSource::from(r#"{"type": "object"}"#);
        assert_eq!(source.resolve().unwrap(), json!({"type": "object"}));
        assert!(SchemaSource::from("{type: object").resolve().is_err());
    }
}
