//! API backend - exposes registered APIs and the management tools over MCP
//!
//! The backend owns the registry, the request executor and the global
//! header scope. Every call returns a [`ToolsCallResult`]; failures set
//! `isError` and carry a readable message instead of propagating.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::builtin::{
    LIST_REGISTERED_APIS, LOAD_API_FROM_FILE, LOAD_APIS_FROM_DIRECTORY, LOAD_FROM_CONFIG,
    REGISTER_WEB_API, SET_DEFAULT_HEADERS, UNREGISTER_API, is_management_tool, management_tools,
};
use super::{
    ApiLoader, ApiRegistry, ConfigLoadSummary, HeaderScope, HttpMethod, RegistryChange,
    RequestExecutor, ToolBinding, join_url, normalize_headers, parse_structured_value,
};
use crate::protocol::{Tool, ToolAnnotations, ToolsCallResult};
use crate::{ApiCallError, Error, Result};

/// Tool-binding facade over the registry, executor and header scope
pub struct ApiBackend {
    registry: Arc<ApiRegistry>,
    executor: RequestExecutor,
    headers: HeaderScope,
}

impl ApiBackend {
    /// Create a backend with an empty registry
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(ApiRegistry::new()))
    }

    /// Create a backend over an existing registry
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_registry(registry: Arc<ApiRegistry>) -> Result<Self> {
        Ok(Self {
            registry,
            executor: RequestExecutor::new()?,
            headers: HeaderScope::new(),
        })
    }

    /// The underlying registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ApiRegistry> {
        &self.registry
    }

    /// The global header scope
    #[must_use]
    pub fn headers(&self) -> &HeaderScope {
        &self.headers
    }

    /// Subscribe to registry changes (for `tools/list_changed`)
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChange> {
        self.registry.subscribe()
    }

    /// Merge headers into the global scope
    pub fn set_default_headers(&self, headers: &BTreeMap<String, String>) {
        self.headers.merge(headers);
    }

    /// Load a directory of definitions
    ///
    /// # Errors
    ///
    /// See [`ApiLoader::load_directory`].
    pub async fn load_directory(&self, path: &Path, pattern: Option<&str>) -> Result<usize> {
        ApiLoader::load_directory(&self.registry, path, pattern).await
    }

    /// Load one definition file
    ///
    /// # Errors
    ///
    /// See [`ApiLoader::load_file`].
    pub async fn load_file(&self, path: &Path) -> Result<Vec<String>> {
        ApiLoader::load_file(&self.registry, path).await
    }

    /// Load a config document
    ///
    /// # Errors
    ///
    /// See [`ApiLoader::load_config`].
    pub async fn load_config(&self, path: &Path) -> Result<ConfigLoadSummary> {
        ApiLoader::load_config(&self.registry, &self.headers, path).await
    }

    /// Management tools followed by every generated tool, sorted by name
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools = management_tools();
        for binding in self.registry.bindings() {
            if is_management_tool(&binding.tool_name) {
                debug!(tool = %binding.tool_name, "Generated tool shadowed by a management tool");
                continue;
            }
            tools.push(generated_tool(&binding));
        }
        tools
    }

    /// Invoke a management or generated tool
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolsCallResult {
        let args = match normalize_arguments(arguments) {
            Ok(args) => args,
            Err(e) => return ToolsCallResult::error(e.to_string()),
        };

        if is_management_tool(name) {
            debug!(tool = %name, "Calling management tool");
            return match self.call_management(name, &args).await {
                Ok(text) => ToolsCallResult::text(text),
                Err(e) => {
                    warn!(tool = %name, error = %e, "Management tool failed");
                    ToolsCallResult::error(e.to_string())
                }
            };
        }

        match self.registry.binding(name) {
            Some(binding) => self.call_generated(&binding, Value::Object(args)).await,
            None => ToolsCallResult::error(format!("Unknown tool: {name}")),
        }
    }

    async fn call_generated(&self, binding: &ToolBinding, arguments: Value) -> ToolsCallResult {
        let validation = binding.schema.validate(&arguments);
        if !validation.is_valid() {
            debug!(tool = %binding.tool_name, violations = validation.violations.len(), "Rejected tool arguments");
            return ToolsCallResult::error(validation.format_error(&binding.schema));
        }

        let global = self.headers.snapshot();
        match self
            .executor
            .execute(&binding.api, binding.method(), &validation.coerced, &global)
            .await
        {
            Ok(result) => ToolsCallResult::text(render_json(&result.unwrap_or(Value::Null))),
            Err(e) => {
                warn!(tool = %binding.tool_name, status = e.status, error = %e.message, "API call failed");
                ToolsCallResult::error(render_api_error(&e))
            }
        }
    }

    async fn call_management(&self, name: &str, args: &Map<String, Value>) -> Result<String> {
        match name {
            REGISTER_WEB_API => self.register_web_api(args),
            SET_DEFAULT_HEADERS => {
                let headers = normalize_headers(Some(required(args, &["headers"])?), "headers")?;
                self.set_default_headers(&headers);
                let names: Vec<_> = headers.keys().map(String::as_str).collect();
                Ok(format!(
                    "Default headers updated ({} total): {}",
                    self.headers.len(),
                    names.join(", ")
                ))
            }
            LIST_REGISTERED_APIS => {
                let documents: Vec<Value> = self
                    .registry
                    .list()
                    .iter()
                    .map(|api| api.to_document())
                    .collect();
                Ok(render_json(&Value::Array(documents)))
            }
            UNREGISTER_API => {
                let target = required_str(args, &["name"])?;
                if self.registry.unregister(target) {
                    Ok(format!("Unregistered API '{target}'"))
                } else {
                    Err(Error::NotFound(format!("No API or tool named '{target}'")))
                }
            }
            LOAD_API_FROM_FILE => {
                let path = required_str(args, &["filePath", "file_path"])?;
                let tools = self.load_file(Path::new(path)).await?;
                Ok(format!(
                    "Loaded API from {path} as tool(s): {}",
                    tools.join(", ")
                ))
            }
            LOAD_APIS_FROM_DIRECTORY => {
                let directory = required_str(args, &["directory"])?;
                let pattern = optional_str(args, &["pattern"])?;
                let count = self.load_directory(Path::new(directory), pattern).await?;
                Ok(format!("Loaded {count} API definition(s) from {directory}"))
            }
            LOAD_FROM_CONFIG => {
                let path = required_str(args, &["configFile", "config_file"])?;
                let summary = self.load_config(Path::new(path)).await?;
                Ok(format!(
                    "Loaded {} API definition(s) from config {path} ({} directories, {} files, {} global headers)",
                    summary.apis_loaded, summary.directories, summary.files, summary.global_headers
                ))
            }
            other => Err(Error::NotFound(format!("Unknown tool: {other}"))),
        }
    }

    fn register_web_api(&self, args: &Map<String, Value>) -> Result<String> {
        let mut document = args.clone();
        document.remove("methods");

        let raw = parse_structured_value(Value::Object(document)).ok_or_else(|| {
            Error::Validation("register_web_api requires a non-empty 'name' and 'url'".to_string())
        })?;
        let name = raw.name.clone().unwrap_or_default();
        let tools = self.registry.try_register(&raw)?;

        info!(api = %name, "Registered API via register_web_api");
        Ok(format!(
            "Registered API '{name}' as tool(s): {}",
            tools.join(", ")
        ))
    }
}

/// Accept tool arguments as an object, a JSON-encoded object string or
/// nothing at all.
///
/// # Errors
///
/// Returns a validation error for any other shape.
pub fn normalize_arguments(arguments: Value) -> Result<Map<String, Value>> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(Error::Validation(
                "Tool arguments must be a JSON object".to_string(),
            )),
        },
        _ => Err(Error::Validation(
            "Tool arguments must be a JSON object".to_string(),
        )),
    }
}

fn generated_tool(binding: &ToolBinding) -> Tool {
    let method = binding.method();
    let url = join_url(binding.api.base_url.as_deref(), &method.endpoint);
    Tool {
        name: binding.tool_name.clone(),
        description: Some(format!("{} ({} {url})", method.description, method.method)),
        input_schema: binding.schema.to_json_schema(),
        annotations: Some(ToolAnnotations {
            read_only_hint: Some(matches!(
                method.method,
                HttpMethod::Get | HttpMethod::Head | HttpMethod::Options
            )),
            destructive_hint: Some(method.method == HttpMethod::Delete),
            open_world_hint: Some(true),
        }),
    }
}

fn render_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn render_api_error(error: &ApiCallError) -> String {
    match error.body {
        Some(ref body) => format!("{error}\nResponse body:\n{}", render_json(body)),
        None => error.to_string(),
    }
}

fn lookup<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| args.get(*key))
        .filter(|v| !v.is_null())
}

fn required<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Result<&'a Value> {
    lookup(args, keys)
        .ok_or_else(|| Error::Validation(format!("Missing required argument '{}'", keys[0])))
}

fn required_str<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Result<&'a str> {
    required(args, keys)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation(format!("Argument '{}' must be a non-empty string", keys[0])))
}

fn optional_str<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Result<Option<&'a str>> {
    match lookup(args, keys) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(Error::Validation(format!(
            "Argument '{}' must be a string",
            keys[0]
        ))),
    }
}
