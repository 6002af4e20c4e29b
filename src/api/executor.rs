//! Request executor - builds and sends the outbound HTTP call of a tool
//!
//! For one invocation the executor:
//!
//! 1. resolves the URL (base URL join, `:param` substitution);
//! 2. places the arguments in the query string (GET, DELETE) or the body;
//! 3. merges headers (global < API < method, `Content-Type` defaulted);
//! 4. applies the method's timeout;
//! 5. extracts `resultPath` from the response body.
//!
//! Every failure surfaces as an [`ApiCallError`]; transport errors never
//! escape untyped.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::RwLock;
use regex::{Captures, Regex};
use reqwest::{
    Client,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ApiDefinition, MethodDefinition};
use crate::{ApiCallError, Error, Result};

const DEFAULT_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid path param regex"));

/// Header set applied to every outbound call unless overridden.
///
/// Read on every invocation, written only by explicit updates.
#[derive(Debug, Default)]
pub struct HeaderScope {
    headers: RwLock<BTreeMap<String, String>>,
}

impl HeaderScope {
    /// Create an empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `headers` into the scope; later values replace earlier ones
    /// regardless of name casing.
    pub fn merge(&self, headers: &BTreeMap<String, String>) {
        let mut current = self.headers.write();
        for (name, value) in headers {
            current.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            current.insert(name.clone(), value.clone());
        }
    }

    /// Copy of the current headers
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.headers.read().clone()
    }

    /// Number of headers in the scope
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.read().len()
    }

    /// Whether the scope is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.read().is_empty()
    }
}

/// Executor for generated tool calls
pub struct RequestExecutor {
    client: Client,
}

impl RequestExecutor {
    /// Create a new executor
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("webapi-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Call `method` of `api` with validated arguments.
    ///
    /// Returns the extracted result; `None` when the result path does not
    /// resolve.
    pub async fn execute(
        &self,
        api: &ApiDefinition,
        method: &MethodDefinition,
        args: &Map<String, Value>,
        global_headers: &BTreeMap<String, String>,
    ) -> std::result::Result<Option<Value>, ApiCallError> {
        let url = resolve_url(api.base_url.as_deref(), &method.endpoint, args);
        let headers = merge_headers(global_headers, &api.headers, &method.headers);
        let header_map = build_header_map(&headers)?;
        let timeout = Duration::from_millis(method.timeout_ms);

        debug!(api = %api.name, method = %method.method, url = %url, "Calling API");

        let mut request = self
            .client
            .request(method.method.to_reqwest(), &url)
            .headers(header_map)
            .timeout(timeout);

        if method.method.uses_query() {
            let pairs = flatten_pairs(args);
            if !pairs.is_empty() {
                request = request.query(&pairs);
            }
        } else if is_form_encoded(&headers) {
            request = request.form(&flatten_pairs(args));
        } else {
            request = request.json(args);
        }

        let response = request
            .send()
            .await
            .map_err(|e| translate_transport_error(&e, method.timeout_ms))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| translate_transport_error(&e, method.timeout_ms))?;

        debug!(api = %api.name, status = status.as_u16(), bytes = text.len(), "API responded");

        if !status.is_success() {
            let mut error = ApiCallError::new(status.as_u16(), format!("HTTP {status}"));
            if !text.trim().is_empty() {
                error = error.with_body(decode_body(&text, "json"));
            }
            return Err(error);
        }

        let body = decode_body(&text, &method.response_type);
        Ok(match method.result_path {
            Some(ref path) => extract_path(&body, path),
            None => Some(body),
        })
    }
}

fn translate_transport_error(error: &reqwest::Error, timeout_ms: u64) -> ApiCallError {
    if error.is_timeout() {
        ApiCallError::new(
            ApiCallError::TIMEOUT,
            format!("Request timed out after {timeout_ms} ms"),
        )
    } else {
        ApiCallError::new(ApiCallError::NETWORK, format!("Request failed: {error}"))
    }
}

/// Join `base` and `endpoint` (unless `endpoint` is absolute) and substitute
/// `:name` placeholders with URL-encoded argument values.
///
/// Substitution does not consume the argument; it is still placed in the
/// query or body.
#[must_use]
pub fn resolve_url(base: Option<&str>, endpoint: &str, args: &Map<String, Value>) -> String {
    let joined = join_url(base, endpoint);
    PATH_PARAM
        .replace_all(&joined, |caps: &Captures| {
            args.get(&caps[1])
                .filter(|v| !v.is_null())
                .map_or_else(|| caps[0].to_string(), |v| encode_component(&scalar_text(v)))
        })
        .into_owned()
}

/// Join a base URL and an endpoint with exactly one slash between them
#[must_use]
pub fn join_url(base: Option<&str>, endpoint: &str) -> String {
    let is_absolute = endpoint.starts_with("http://") || endpoint.starts_with("https://");
    match base {
        Some(base) if !is_absolute && !base.is_empty() => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        ),
        _ => endpoint.to_string(),
    }
}

/// Merge header scopes with precedence global < API < method.
///
/// Names compare case-insensitively; the spelling of the winning scope is
/// kept. `Content-Type: application/json` is added when no scope sets one.
#[must_use]
pub fn merge_headers(
    global: &BTreeMap<String, String>,
    api: &BTreeMap<String, String>,
    method: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for scope in [global, api, method] {
        for (name, value) in scope {
            merged.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            merged.insert(name.clone(), value.clone());
        }
    }

    if !merged
        .keys()
        .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
    {
        merged.insert("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
    }
    merged
}

fn is_form_encoded(headers: &BTreeMap<String, String>) -> bool {
    headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
            && value.to_ascii_lowercase().contains(FORM_CONTENT_TYPE)
    })
}

fn build_header_map(
    headers: &BTreeMap<String, String>,
) -> std::result::Result<HeaderMap, ApiCallError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = name.parse::<HeaderName>().map_err(|_| {
            ApiCallError::new(ApiCallError::NETWORK, format!("Invalid header name '{name}'"))
        })?;
        let header_value = value.parse::<HeaderValue>().map_err(|_| {
            ApiCallError::new(
                ApiCallError::NETWORK,
                format!("Invalid value for header '{name}'"),
            )
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Flatten arguments into `key=value` pairs: scalars as text, `null`
/// skipped, arrays as repeated keys, objects as compact JSON.
#[must_use]
pub fn flatten_pairs(args: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(args.len());
    for (key, value) in args {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push((key.clone(), scalar_text(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_text(other))),
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn decode_body(text: &str, response_type: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    if response_type.eq_ignore_ascii_case("text") {
        return Value::String(text.to_string());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Walk a dot-separated path through a JSON value.
///
/// Objects are indexed by key and arrays by numeric segment. Returns `None`
/// as soon as a segment cannot be resolved.
#[must_use]
pub fn extract_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current.clone())
}
