//! API definition types
//!
//! Two families live here:
//!
//! - the **raw** document model ([`RawApiDefinition`]) produced by the
//!   parsers. It mirrors what an operator wrote, keeps every field optional
//!   and records which document shape was used;
//! - the **canonical** model ([`ApiDefinition`]) produced by
//!   [`normalize`](super::normalize). Every default is filled in and both
//!   document shapes collapse into one list of [`MethodDefinition`]s.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Default per-call timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default advisory response type
pub const DEFAULT_RESPONSE_TYPE: &str = "json";

// ============================================================================
// Enumerations
// ============================================================================

/// HTTP verb of a method definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// All recognised verbs
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Head,
        Self::Options,
    ];

    /// Parse a verb, ignoring case and surrounding whitespace
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(value))
    }

    /// Upper-case wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether caller arguments travel in the query string (otherwise the body)
    #[must_use]
    pub fn uses_query(self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }

    /// Convert to the HTTP client's method type
    #[must_use]
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Text
    #[default]
    String,
    /// Any JSON number
    Number,
    /// `true` / `false`
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
}

impl ParamType {
    /// All recognised types
    pub const ALL: [Self; 5] = [
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Object,
        Self::Array,
    ];

    /// Parse a type name, ignoring case and surrounding whitespace
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
    }

    /// Lower-case name (also the JSON Schema `type`)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which document shape a definition was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DefinitionShape {
    /// `url`/`method`/`parameters` at the top level; one tool per API
    #[default]
    Flat,
    /// A `methods` array; one tool per method
    MultiMethod,
}

// ============================================================================
// Canonical model
// ============================================================================

/// One declared parameter after normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    /// Declared type
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether callers must supply it
    pub required: bool,
    /// Human-readable description
    pub description: String,
    /// Value used when the caller omits the argument
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// One invocable operation
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// Operation name (the API name for flat definitions)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Path or full URL; may contain `:param` placeholders
    pub endpoint: String,
    /// HTTP verb
    pub method: HttpMethod,
    /// Declared parameters
    pub parameters: BTreeMap<String, ParameterSpec>,
    /// Method-scoped headers
    pub headers: BTreeMap<String, String>,
    /// Dotted path applied to the response body
    pub result_path: Option<String>,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Advisory response type (`json` or `text`)
    pub response_type: String,
}

/// One logical API surface after normalization
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDefinition {
    /// Registry identity
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Scheme + host prefix joined with relative endpoints
    pub base_url: Option<String>,
    /// API-scoped headers
    pub headers: BTreeMap<String, String>,
    /// Operations, in declaration order
    pub methods: Vec<MethodDefinition>,
    /// Shape the definition was written in
    pub shape: DefinitionShape,
}

/// Normalize a name into a tool-name segment: lower-case, whitespace runs
/// collapsed into a single underscore.
#[must_use]
pub fn tool_name_segment(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

impl ApiDefinition {
    /// Registry key of this API (case- and spacing-insensitive)
    #[must_use]
    pub fn key(&self) -> String {
        tool_name_segment(&self.name)
    }

    /// Generated tool name for one of this API's methods
    #[must_use]
    pub fn tool_name(&self, method: &MethodDefinition) -> String {
        match self.shape {
            DefinitionShape::Flat => tool_name_segment(&self.name),
            DefinitionShape::MultiMethod => format!(
                "{}_{}",
                tool_name_segment(&self.name),
                tool_name_segment(&method.name)
            ),
        }
    }

    /// Generated tool names for every method, in declaration order
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| self.tool_name(m)).collect()
    }

    /// Render back into the structured document form.
    ///
    /// The output parses and normalizes into a definition equal to `self`.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("name".into(), json!(self.name));
        doc.insert("description".into(), json!(self.description));
        if let Some(ref base) = self.base_url {
            doc.insert("baseUrl".into(), json!(base));
        }
        doc.insert("headers".into(), json!(self.headers));

        match self.shape {
            DefinitionShape::Flat => {
                if let Some(method) = self.methods.first() {
                    write_method_fields(&mut doc, method);
                }
            }
            DefinitionShape::MultiMethod => {
                let methods: Vec<Value> = self
                    .methods
                    .iter()
                    .map(|m| {
                        let mut entry = Map::new();
                        entry.insert("name".into(), json!(m.name));
                        entry.insert("description".into(), json!(m.description));
                        entry.insert("headers".into(), json!(m.headers));
                        write_method_fields(&mut entry, m);
                        Value::Object(entry)
                    })
                    .collect();
                doc.insert("methods".into(), Value::Array(methods));
            }
        }

        Value::Object(doc)
    }
}

fn write_method_fields(target: &mut Map<String, Value>, method: &MethodDefinition) {
    target.insert("url".into(), json!(method.endpoint));
    target.insert("method".into(), json!(method.method));
    target.insert("parameters".into(), json!(method.parameters));
    if let Some(ref path) = method.result_path {
        target.insert("resultPath".into(), json!(path));
    }
    target.insert("timeout".into(), json!(method.timeout_ms));
    target.insert("responseType".into(), json!(method.response_type));
}

impl Serialize for ApiDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

// ============================================================================
// Raw document model
// ============================================================================

/// One operation as written in a document.
///
/// In the flat shape the whole document deserializes into this struct; in
/// the multi-method shape each `methods` entry does.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMethod {
    /// Operation name
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Endpoint (preferred spelling)
    #[serde(default)]
    pub url: Option<String>,
    /// Endpoint (alternative spelling)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP verb
    #[serde(default)]
    pub method: Option<String>,
    /// Parameter declarations (shape checked during normalization)
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Headers (shape checked during normalization)
    #[serde(default)]
    pub headers: Option<Value>,
    /// Dotted result path
    #[serde(default, alias = "result_path")]
    pub result_path: Option<String>,
    /// Timeout in milliseconds (number or numeric string)
    #[serde(default)]
    pub timeout: Option<Value>,
    /// Advisory response type
    #[serde(default, alias = "response_type")]
    pub response_type: Option<String>,
}

impl RawMethod {
    /// First non-blank endpoint-resolving field (`url`, then `endpoint`)
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        [self.url.as_deref(), self.endpoint.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Document shape, decided once right after parsing
#[derive(Debug, Clone, PartialEq)]
pub enum RawShape {
    /// Single operation described at the top level
    Flat(RawMethod),
    /// `methods` array
    MultiMethod(Vec<RawMethod>),
}

/// An API definition exactly as a parser produced it
#[derive(Debug, Clone, PartialEq)]
pub struct RawApiDefinition {
    /// API name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Base URL
    pub base_url: Option<String>,
    /// API-scoped headers (flat shape: taken from the top level)
    pub headers: Option<Value>,
    /// Operations
    pub shape: RawShape,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "base_url")]
    base_url: Option<String>,
    #[serde(default)]
    headers: Option<Value>,
    #[serde(default)]
    methods: Option<Vec<RawMethod>>,
}

impl RawApiDefinition {
    /// Build from a decoded document.
    ///
    /// A `methods` array selects the multi-method shape; otherwise the
    /// document itself is the single method.
    pub fn from_value(value: Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("API definition must be a mapping".to_string());
        }

        let envelope: RawEnvelope =
            serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

        let shape = match envelope.methods {
            Some(methods) => RawShape::MultiMethod(methods),
            None => {
                let mut flat: RawMethod =
                    serde_json::from_value(value).map_err(|e| e.to_string())?;
                // API-level fields are owned by the envelope.
                flat.headers = None;
                RawShape::Flat(flat)
            }
        };

        Ok(Self {
            name: envelope.name,
            description: envelope.description,
            base_url: envelope.base_url,
            headers: envelope.headers,
            shape,
        })
    }

    /// Whether the identity fields a parser insists on are present:
    /// a non-blank name plus an endpoint (flat) or at least one method.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        let named = self.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        let routable = match &self.shape {
            RawShape::Flat(method) => method.endpoint().is_some(),
            RawShape::MultiMethod(methods) => !methods.is_empty(),
        };
        named && routable
    }
}
