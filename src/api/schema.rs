//! Per-method argument schema.
//!
//! [`build_schema`] derives an [`ArgumentSchema`] from a method's parameter
//! declarations. The schema serves two purposes:
//!
//! - rendering the tool's `inputSchema` for `tools/list`;
//! - validating caller arguments before any HTTP request is made.
//!
//! # Validation steps (per declared parameter)
//!
//! 1. **Missing values**: a declared default is applied; otherwise a
//!    required parameter is a violation and an optional one is skipped.
//! 2. **Type check with coercion**: safe coercions are applied:
//!    - `"123"` → `123` for `number` fields
//!    - `"true"` or `"false"` (any case) → a bool for `boolean` fields
//!    - numbers and booleans → their text for `string` fields
//!    - JSON text → the decoded value for `object` / `array` fields
//!
//! Arguments that match no declared parameter are dropped.

use std::fmt::Write as _;

use serde_json::{Map, Value, json};
use tracing::debug;

use super::{MethodDefinition, ParamType};

/// Validator for one declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Parameter name
    pub name: String,
    /// Expected type
    pub kind: ParamType,
    /// Description shown to callers
    pub description: String,
    /// Whether the parameter may be omitted
    pub optional: bool,
    /// Value applied when the caller omits the parameter
    pub default: Option<Value>,
}

/// Argument schema of one generated tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSchema {
    fields: Vec<FieldSchema>,
}

/// Derive the argument schema of a method
#[must_use]
pub fn build_schema(method: &MethodDefinition) -> ArgumentSchema {
    let fields = method
        .parameters
        .iter()
        .map(|(name, spec)| FieldSchema {
            name: name.clone(),
            kind: spec.param_type,
            description: spec.description.clone(),
            optional: !spec.required,
            default: spec.default.clone(),
        })
        .collect();
    ArgumentSchema { fields }
}

/// One rejected argument
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationViolation {
    /// Offending parameter, empty when the arguments as a whole are wrong
    pub param: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationViolation {
    fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            message: message.into(),
        }
    }
}

/// Outcome of [`ArgumentSchema::validate`]
#[derive(Debug, Clone)]
pub struct SchemaValidationResult {
    /// All violations found. Empty means the arguments are valid.
    pub violations: Vec<ValidationViolation>,
    /// Arguments after defaults and coercions, restricted to declared names.
    pub coerced: Map<String, Value>,
}

impl SchemaValidationResult {
    /// Whether the arguments can be sent
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Format violations into an LLM-friendly error string, including the
    /// list of valid parameters.
    #[must_use]
    pub fn format_error(&self, schema: &ArgumentSchema) -> String {
        let mut out = String::from("Tool call validation failed:\n\n");

        for v in &self.violations {
            if v.param.is_empty() {
                let _ = writeln!(out, "- {}", v.message);
            } else {
                let _ = writeln!(out, "- Parameter '{}': {}", v.param, v.message);
            }
        }

        if !schema.fields.is_empty() {
            out.push_str("\nValid parameters for this tool:\n");
            for field in &schema.fields {
                let requirement = if field.optional { "optional" } else { "required" };
                let _ = writeln!(
                    out,
                    "  - {}: {} ({requirement}) - {}",
                    field.name, field.kind, field.description
                );
            }
        }

        out
    }
}

impl ArgumentSchema {
    /// Declared fields, ordered by name
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Render as a JSON Schema object for the tool's `inputSchema`
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = Map::new();
            property.insert("type".into(), json!(field.kind.as_str()));
            if field.kind == ParamType::Array {
                property.insert("items".into(), json!({}));
            }
            property.insert("description".into(), json!(field.description));
            if let Some(ref default) = field.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(field.name.clone(), Value::Object(property));
            if !field.optional {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate and coerce caller arguments
    #[must_use]
    pub fn validate(&self, arguments: &Value) -> SchemaValidationResult {
        let empty = Map::new();
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return SchemaValidationResult {
                    violations: vec![ValidationViolation::new(
                        "",
                        "Arguments must be a JSON object",
                    )],
                    coerced: Map::new(),
                };
            }
        };

        let mut violations = Vec::new();
        let mut coerced = Map::new();

        for field in &self.fields {
            let Some(value) = args.get(&field.name).filter(|v| !v.is_null()) else {
                if let Some(ref default) = field.default {
                    coerced.insert(field.name.clone(), default.clone());
                } else if !field.optional {
                    violations.push(ValidationViolation::new(
                        &field.name,
                        "required parameter is missing",
                    ));
                }
                continue;
            };

            match coerce(value, field.kind) {
                Some(value) => {
                    coerced.insert(field.name.clone(), value);
                }
                None => violations.push(ValidationViolation::new(
                    &field.name,
                    format!(
                        "expected {}, got {}",
                        field.kind,
                        value_type_name(value)
                    ),
                )),
            }
        }

        for key in args.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                debug!(param = %key, "Dropping undeclared argument");
            }
        }

        SchemaValidationResult {
            violations,
            coerced,
        }
    }
}

fn coerce(value: &Value, kind: ParamType) -> Option<Value> {
    match (kind, value) {
        (ParamType::String, Value::String(_))
        | (ParamType::Number, Value::Number(_))
        | (ParamType::Boolean, Value::Bool(_))
        | (ParamType::Object, Value::Object(_))
        | (ParamType::Array, Value::Array(_)) => Some(value.clone()),

        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamType::Number, Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Value::from)
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(|f| serde_json::Number::from_f64(f).map(Value::Number)))
        }

        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },

        (ParamType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_object),
        (ParamType::Array, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_array),

        _ => None,
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::normalize_value;

    fn schema_for(parameters: Value) -> ArgumentSchema {
        let def = normalize_value(&json!({
            "name": "t",
            "url": "/t",
            "parameters": parameters
        }))
        .unwrap();
        build_schema(&def.methods[0])
    }

    #[test]
    fn renders_json_schema() {
        let schema = schema_for(json!({
            "q": {"type": "string", "required": true, "description": "Query"},
            "limit": {"type": "number", "default": 10}
        }));

        let rendered = schema.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["properties"]["q"]["type"], "string");
        assert_eq!(rendered["properties"]["q"]["description"], "Query");
        assert_eq!(rendered["properties"]["limit"]["default"], 10);
        assert_eq!(rendered["required"], json!(["q"]));
    }

    #[test]
    fn array_properties_carry_items() {
        let rendered = schema_for(json!({
            "tags": {"type": "array"},
            "q": {"type": "string"}
        }))
        .to_json_schema();
        assert_eq!(rendered["properties"]["tags"]["items"], json!({}));
        assert!(rendered["properties"]["q"].get("items").is_none());
    }

    #[test]
    fn applies_defaults_and_flags_missing_required() {
        let schema = schema_for(json!({
            "q": {"type": "string", "required": true},
            "limit": {"type": "number", "default": 10},
            "lang": {"type": "string"}
        }));

        let result = schema.validate(&json!({}));
        assert!(!result.is_valid());
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].param, "q");

        let result = schema.validate(&json!({"q": "rust"}));
        assert!(result.is_valid());
        assert_eq!(result.coerced.get("limit"), Some(&json!(10)));
        assert!(!result.coerced.contains_key("lang"));
    }

    #[test]
    fn coerces_safe_values() {
        let schema = schema_for(json!({
            "id": {"type": "string"},
            "n": {"type": "number"},
            "flag": {"type": "boolean"},
            "filter": {"type": "object"},
            "tags": {"type": "array"}
        }));

        let result = schema.validate(&json!({
            "id": 42,
            "n": "3.5",
            "flag": "TRUE",
            "filter": "{\"a\": 1}",
            "tags": "[\"x\"]"
        }));
        assert!(result.is_valid(), "{:?}", result.violations);
        assert_eq!(result.coerced["id"], json!("42"));
        assert_eq!(result.coerced["n"], json!(3.5));
        assert_eq!(result.coerced["flag"], json!(true));
        assert_eq!(result.coerced["filter"], json!({"a": 1}));
        assert_eq!(result.coerced["tags"], json!(["x"]));
    }

    #[test]
    fn rejects_wrong_types() {
        let schema = schema_for(json!({
            "n": {"type": "number"},
            "tags": {"type": "array"}
        }));
        let result = schema.validate(&json!({"n": "many", "tags": {"a": 1}}));
        assert_eq!(result.violations.len(), 2);

        let message = result.format_error(&schema);
        assert!(message.contains("Parameter 'n': expected number, got string"));
        assert!(message.contains("Valid parameters for this tool:"));
        assert!(message.contains("tags: array (optional)"));
    }

    #[test]
    fn drops_undeclared_arguments() {
        let schema = schema_for(json!({"q": {}}));
        let result = schema.validate(&json!({"q": "x", "extra": 1}));
        assert!(result.is_valid());
        assert_eq!(result.coerced.len(), 1);
    }

    #[test]
    fn rejects_non_object_arguments() {
        let schema = schema_for(json!({}));
        let result = schema.validate(&json!([1, 2]));
        assert!(!result.is_valid());
        assert!(schema.validate(&Value::Null).is_valid());
    }
}
