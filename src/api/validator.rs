//! Definition validation and normalization
//!
//! Turns a [`RawApiDefinition`] into the canonical [`ApiDefinition`]:
//! required fields are enforced, verbs/types are case-normalized and every
//! default is filled in. Normalizing the document form of an already
//! normalized definition yields an equal definition.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::warn;

use super::{
    ApiDefinition, DEFAULT_RESPONSE_TYPE, DEFAULT_TIMEOUT_MS, DefinitionShape, HttpMethod,
    MethodDefinition, ParamType, ParameterSpec, RawApiDefinition, RawMethod, RawShape,
    tool_name_segment,
};
use crate::{Error, Result};

/// Normalize a decoded document (convenience for callers holding JSON)
pub fn normalize_value(value: &Value) -> Result<ApiDefinition> {
    let empty = match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(Error::Validation("API definition is empty".to_string()));
    }

    let raw = RawApiDefinition::from_value(value.clone()).map_err(Error::Validation)?;
    normalize(&raw)
}

/// Validate and normalize a raw definition
pub fn normalize(raw: &RawApiDefinition) -> Result<ApiDefinition> {
    let name = non_blank(raw.name.as_deref())
        .ok_or_else(|| Error::Validation("API name is required".to_string()))?;

    let description =
        non_blank(raw.description.as_deref()).unwrap_or_else(|| format!("{name} API"));
    let base_url = non_blank(raw.base_url.as_deref());
    let headers = normalize_headers(raw.headers.as_ref(), &name)?;

    let (shape, methods) = match &raw.shape {
        RawShape::Flat(method) => {
            let method = normalize_method(method, &name, &name, &description)?;
            (DefinitionShape::Flat, vec![method])
        }
        RawShape::MultiMethod(raw_methods) => {
            if raw_methods.is_empty() {
                return Err(Error::Validation(format!(
                    "API '{name}' declares an empty methods list"
                )));
            }
            let mut methods: Vec<MethodDefinition> = Vec::with_capacity(raw_methods.len());
            for (index, raw_method) in raw_methods.iter().enumerate() {
                let method_name = non_blank(raw_method.name.as_deref()).ok_or_else(|| {
                    Error::Validation(format!("API '{name}' method #{index} has no name"))
                })?;
                let fallback = format!("{name} {method_name}");
                methods.push(normalize_method(raw_method, &name, &method_name, &fallback)?);
            }
            (DefinitionShape::MultiMethod, dedupe_methods(&name, methods))
        }
    };

    Ok(ApiDefinition {
        name,
        description,
        base_url,
        headers,
        methods,
        shape,
    })
}

/// Later methods win when two normalize to the same tool name
fn dedupe_methods(api: &str, methods: Vec<MethodDefinition>) -> Vec<MethodDefinition> {
    let mut seen = HashSet::new();
    let mut kept: Vec<MethodDefinition> = methods
        .into_iter()
        .rev()
        .filter(|m| {
            let fresh = seen.insert(tool_name_segment(&m.name));
            if !fresh {
                warn!(api = %api, method = %m.name, "Duplicate method name, keeping the later declaration");
            }
            fresh
        })
        .collect();
    kept.reverse();
    kept
}

fn normalize_method(
    raw: &RawMethod,
    api: &str,
    name: &str,
    fallback_description: &str,
) -> Result<MethodDefinition> {
    let endpoint = raw.endpoint().ok_or_else(|| {
        Error::Validation(format!(
            "'{name}' of API '{api}' requires a url or endpoint"
        ))
    })?;

    let method = match non_blank(raw.method.as_deref()) {
        None => HttpMethod::Get,
        Some(verb) => HttpMethod::parse(&verb).ok_or_else(|| {
            Error::Validation(format!(
                "Unsupported HTTP method '{verb}' in '{name}' (expected one of {})",
                HttpMethod::ALL.map(HttpMethod::as_str).join(", ")
            ))
        })?,
    };

    let description = non_blank(raw.description.as_deref())
        .unwrap_or_else(|| fallback_description.to_string());

    Ok(MethodDefinition {
        name: name.to_string(),
        description,
        endpoint: endpoint.to_string(),
        method,
        parameters: normalize_parameters(raw.parameters.as_ref(), name)?,
        headers: normalize_headers(raw.headers.as_ref(), name)?,
        result_path: non_blank(raw.result_path.as_deref()),
        timeout_ms: normalize_timeout(raw.timeout.as_ref(), name)?,
        response_type: non_blank(raw.response_type.as_deref())
            .map_or_else(|| DEFAULT_RESPONSE_TYPE.to_string(), |t| t.to_lowercase()),
    })
}

fn normalize_parameters(
    value: Option<&Value>,
    owner: &str,
) -> Result<BTreeMap<String, ParameterSpec>> {
    let map = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::Validation(format!(
                "Parameters of '{owner}' must be a mapping of name to declaration"
            )));
        }
    };

    let mut parameters = BTreeMap::new();
    for (param_name, declaration) in map {
        let param_name = param_name.trim();
        if param_name.is_empty() {
            return Err(Error::Validation(format!(
                "'{owner}' declares a parameter with an empty name"
            )));
        }
        let Value::Object(fields) = declaration else {
            return Err(Error::Validation(format!(
                "Parameter '{param_name}' of '{owner}' must be a mapping of fields"
            )));
        };

        let param_type = match fields.get("type") {
            None | Some(Value::Null) => ParamType::String,
            Some(Value::String(t)) if t.trim().is_empty() => ParamType::String,
            Some(Value::String(t)) => ParamType::parse(t).ok_or_else(|| {
                Error::Validation(format!(
                    "Parameter '{param_name}' of '{owner}' has unsupported type '{t}' (expected one of {})",
                    ParamType::ALL.map(ParamType::as_str).join(", ")
                ))
            })?,
            Some(other) => {
                return Err(Error::Validation(format!(
                    "Parameter '{param_name}' of '{owner}' has a non-text type: {other}"
                )));
            }
        };

        let description = fields
            .get("description")
            .and_then(Value::as_str)
            .and_then(|d| non_blank(Some(d)))
            .unwrap_or_else(|| format!("{param_name} 参数"));

        parameters.insert(
            param_name.to_string(),
            ParameterSpec {
                param_type,
                required: coerce_required(fields.get("required")),
                description,
                default: fields.get("default").filter(|v| !v.is_null()).cloned(),
            },
        );
    }
    Ok(parameters)
}

/// `true`, `"true"` (any case) and `"是"` are required; anything else is not
pub fn coerce_required(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s == "是"
        }
        _ => false,
    }
}

/// Validate a header mapping; values are stringified and nulls dropped
pub fn normalize_headers(value: Option<&Value>, owner: &str) -> Result<BTreeMap<String, String>> {
    let map = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::Validation(format!(
                "Headers of '{owner}' must be a mapping of name to value"
            )));
        }
    };

    Ok(map
        .iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name.trim().to_string(), value))
        })
        .filter(|(name, _)| !name.is_empty())
        .collect())
}

fn normalize_timeout(value: Option<&Value>, owner: &str) -> Result<u64> {
    let invalid = |v: &Value| {
        Error::Validation(format!(
            "Timeout of '{owner}' must be a positive number of milliseconds, got {v}"
        ))
    };
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(DEFAULT_TIMEOUT_MS);
    };
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.filter(|t| *t > 0).ok_or_else(|| invalid(value))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_structured_value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn flat(value: Value) -> Result<ApiDefinition> {
        normalize_value(&value)
    }

    #[test]
    fn fills_defaults() {
        let def = flat(json!({
            "name": "weather",
            "url": "https://api.example.com/now",
            "parameters": {"city": {}}
        }))
        .unwrap();

        assert_eq!(def.description, "weather API");
        assert!(def.headers.is_empty());
        assert_eq!(def.shape, DefinitionShape::Flat);

        let method = &def.methods[0];
        assert_eq!(method.name, "weather");
        assert_eq!(method.method, HttpMethod::Get);
        assert_eq!(method.timeout_ms, 30_000);
        assert_eq!(method.response_type, "json");
        assert_eq!(method.description, "weather API");

        let city = &method.parameters["city"];
        assert_eq!(city.param_type, ParamType::String);
        assert!(!city.required);
        assert_eq!(city.description, "city 参数");
        assert_eq!(city.default, None);
    }

    #[test]
    fn normalizes_case_and_booleans() {
        let def = flat(json!({
            "name": "search",
            "endpoint": "/search",
            "method": "post",
            "parameters": {
                "q": {"type": "STRING", "required": "true"},
                "page": {"type": "Number", "required": "是", "default": 1},
                "debug": {"type": "boolean", "required": "yes"}
            }
        }))
        .unwrap();

        let method = &def.methods[0];
        assert_eq!(method.method, HttpMethod::Post);
        assert!(method.parameters["q"].required);
        assert!(method.parameters["page"].required);
        assert_eq!(method.parameters["page"].param_type, ParamType::Number);
        assert_eq!(method.parameters["page"].default, Some(json!(1)));
        assert!(!method.parameters["debug"].required);
    }

    #[test]
    fn rejects_missing_identity() {
        assert!(matches!(flat(json!({"url": "/x"})), Err(Error::Validation(_))));
        assert!(matches!(flat(json!({"name": "x"})), Err(Error::Validation(_))));
        assert!(matches!(flat(json!({"name": " ", "url": "/x"})), Err(Error::Validation(_))));
        assert!(matches!(flat(json!({})), Err(Error::Validation(_))));
        assert!(matches!(flat(Value::Null), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_unknown_method_and_type() {
        let err = flat(json!({"name": "x", "url": "/x", "method": "TRACE"})).unwrap_err();
        assert!(err.to_string().contains("TRACE"));

        let err = flat(json!({
            "name": "x", "url": "/x",
            "parameters": {"n": {"type": "integer"}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn rejects_non_mapping_parameter() {
        let err = flat(json!({
            "name": "x", "url": "/x",
            "parameters": {"n": "string"}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = flat(json!({"name": "x", "url": "/x", "parameters": ["n"]})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn timeout_validation() {
        let def = flat(json!({"name": "x", "url": "/x", "timeout": "1500"})).unwrap();
        assert_eq!(def.methods[0].timeout_ms, 1500);
        assert!(flat(json!({"name": "x", "url": "/x", "timeout": 0})).is_err());
        assert!(flat(json!({"name": "x", "url": "/x", "timeout": "soon"})).is_err());
    }

    #[test]
    fn stringifies_header_values() {
        let def = flat(json!({
            "name": "x", "url": "/x",
            "headers": {"X-Version": 2, "X-Flag": true, "X-Drop": null}
        }))
        .unwrap();
        assert_eq!(def.headers.get("X-Version").map(String::as_str), Some("2"));
        assert_eq!(def.headers.get("X-Flag").map(String::as_str), Some("true"));
        assert!(!def.headers.contains_key("X-Drop"));
    }

    #[test]
    fn multi_method_definition() {
        let def = flat(json!({
            "name": "GitHub",
            "baseUrl": "https://api.github.com",
            "headers": {"Accept": "application/vnd.github+json"},
            "methods": [
                {"name": "Get User", "url": "/users/:login", "headers": {"X-Trace": "1"}},
                {"name": "list repos", "endpoint": "/users/:login/repos", "method": "get"}
            ]
        }))
        .unwrap();

        assert_eq!(def.shape, DefinitionShape::MultiMethod);
        assert_eq!(def.tool_names(), vec!["github_get_user", "github_list_repos"]);
        assert_eq!(def.methods[0].description, "GitHub Get User");
        assert_eq!(def.methods[0].headers["X-Trace"], "1");
    }

    #[test]
    fn multi_method_requires_names_and_methods() {
        assert!(flat(json!({"name": "x", "methods": []})).is_err());
        assert!(flat(json!({"name": "x", "methods": [{"url": "/a"}]})).is_err());
        assert!(flat(json!({"name": "x", "methods": [{"name": "a"}]})).is_err());
    }

    #[test]
    fn duplicate_methods_keep_the_later_one() {
        let def = flat(json!({
            "name": "x",
            "methods": [
                {"name": "Fetch", "url": "/old"},
                {"name": "other", "url": "/other"},
                {"name": "fetch", "url": "/new"}
            ]
        }))
        .unwrap();
        assert_eq!(def.methods.len(), 2);
        assert_eq!(def.methods[0].name, "other");
        assert_eq!(def.methods[1].endpoint, "/new");
    }

    #[test]
    fn normalization_is_idempotent() {
        let original = flat(json!({
            "name": "Weather API",
            "baseUrl": "https://api.example.com/",
            "url": "/v1/current",
            "method": "put",
            "parameters": {
                "city": {"type": "string", "required": true, "description": "City"},
                "days": {"type": "number", "default": 3}
            },
            "headers": {"X-Key": "k"},
            "resultPath": "data.items",
            "timeout": 5000,
            "responseType": "JSON"
        }))
        .unwrap();

        let reparsed = parse_structured_value(original.to_document()).unwrap();
        assert_eq!(normalize(&reparsed).unwrap(), original);

        let multi = flat(json!({
            "name": "svc",
            "methods": [{"name": "a", "url": "/a", "parameters": {"p": {"type": "array"}}}]
        }))
        .unwrap();
        let reparsed = parse_structured_value(multi.to_document()).unwrap();
        assert_eq!(normalize(&reparsed).unwrap(), multi);
    }
}
