//! Live mapping from generated tool name to invocable binding

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{
    ApiDefinition, ArgumentSchema, MethodDefinition, RawApiDefinition, build_schema, normalize,
    normalize_value, tool_name_segment,
};
use crate::Result;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Everything needed to invoke one generated tool
#[derive(Debug, Clone)]
pub struct ToolBinding {
    /// Generated tool name
    pub tool_name: String,
    /// Owning API
    pub api: Arc<ApiDefinition>,
    /// Index into `api.methods`
    pub method_index: usize,
    /// Argument schema of the method
    pub schema: ArgumentSchema,
}

impl ToolBinding {
    /// The bound method
    #[must_use]
    pub fn method(&self) -> &MethodDefinition {
        &self.api.methods[self.method_index]
    }
}

/// Registry mutation, broadcast to subscribers after the write lock is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    /// An API was registered (or replaced)
    Registered {
        /// API name
        api: String,
        /// Tools it now owns
        tools: Vec<String>,
    },
    /// Tools were removed
    Unregistered {
        /// API name
        api: String,
        /// Tools that disappeared
        tools: Vec<String>,
    },
}

#[derive(Debug)]
struct ApiRecord {
    definition: Arc<ApiDefinition>,
    tools: Vec<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    tools: HashMap<String, Arc<ToolBinding>>,
    apis: HashMap<String, ApiRecord>,
}

impl RegistryState {
    /// Remove `tool` from its owner; the owner goes away with its last tool
    fn detach_tool(&mut self, owner: &str, tool: &str) {
        let emptied = match self.apis.get_mut(owner) {
            Some(record) => {
                record.tools.retain(|t| t != tool);
                record.tools.is_empty()
            }
            None => false,
        };
        if emptied {
            debug!(api = %owner, "Dropping API with no remaining tools");
            self.apis.remove(owner);
        }
    }
}

/// API registry
///
/// Reads take the shared lock; each mutation holds the exclusive lock for
/// its whole critical section.
pub struct ApiRegistry {
    state: RwLock<RegistryState>,
    changes: broadcast::Sender<RegistryChange>,
}

impl Default for ApiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(RegistryState::default()),
            changes,
        }
    }

    /// Subscribe to registry mutations
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChange> {
        self.changes.subscribe()
    }

    /// Normalize and register a parsed definition.
    ///
    /// Failures are logged and reported as `false`.
    pub fn register(&self, raw: &RawApiDefinition) -> bool {
        match self.try_register(raw) {
            Ok(_) => true,
            Err(e) => {
                error!(
                    api = raw.name.as_deref().unwrap_or("<unnamed>"),
                    error = %e,
                    "Failed to register API"
                );
                false
            }
        }
    }

    /// Normalize and register a parsed definition, returning its tool names
    ///
    /// # Errors
    ///
    /// Returns a validation error when the definition does not normalize.
    pub fn try_register(&self, raw: &RawApiDefinition) -> Result<Vec<String>> {
        let definition = normalize(raw)?;
        Ok(self.insert(definition))
    }

    /// Normalize and register a decoded document, returning its tool names
    ///
    /// # Errors
    ///
    /// Returns a validation error when the document does not normalize.
    pub fn register_value(&self, document: &Value) -> Result<Vec<String>> {
        let definition = normalize_value(document)?;
        Ok(self.insert(definition))
    }

    /// Store an already-normalized definition.
    ///
    /// Replaces every tool a previous version of the same API produced. A tool
    /// name owned by a different API is taken over with a warning.
    pub fn insert(&self, definition: ApiDefinition) -> Vec<String> {
        let key = definition.key();
        let definition = Arc::new(definition);
        let bindings: Vec<Arc<ToolBinding>> = definition
            .methods
            .iter()
            .enumerate()
            .map(|(method_index, method)| {
                Arc::new(ToolBinding {
                    tool_name: definition.tool_name(method),
                    api: Arc::clone(&definition),
                    method_index,
                    schema: build_schema(method),
                })
            })
            .collect();
        let tool_names: Vec<String> = bindings.iter().map(|b| b.tool_name.clone()).collect();

        {
            let mut guard = self.state.write();
            let state = &mut *guard;

            if let Some(previous) = state.apis.remove(&key) {
                warn!(api = %definition.name, "API already registered, overwriting");
                for tool in &previous.tools {
                    state.tools.remove(tool);
                }
            }

            for binding in bindings {
                let tool = binding.tool_name.clone();
                if let Some(displaced) = state.tools.insert(tool.clone(), binding) {
                    warn!(
                        tool = %tool,
                        previous_api = %displaced.api.name,
                        api = %definition.name,
                        "Tool name already registered by another API, overwriting"
                    );
                    state.detach_tool(&displaced.api.key(), &tool);
                }
            }

            state.apis.insert(
                key,
                ApiRecord {
                    definition: Arc::clone(&definition),
                    tools: tool_names.clone(),
                },
            );
        }

        info!(api = %definition.name, tools = ?tool_names, "Registered API");
        let _ = self.changes.send(RegistryChange::Registered {
            api: definition.name.clone(),
            tools: tool_names.clone(),
        });
        tool_names
    }

    /// Remove an API (by API name) or a single generated tool (by tool name).
    ///
    /// Returns `false` when nothing matched.
    pub fn unregister(&self, name: &str) -> bool {
        let key = tool_name_segment(name);

        let removed = {
            let mut guard = self.state.write();
            let state = &mut *guard;

            if let Some(record) = state.apis.remove(&key) {
                for tool in &record.tools {
                    state.tools.remove(tool);
                }
                Some((record.definition.name.clone(), record.tools))
            } else if let Some(binding) = state.tools.remove(&key) {
                state.detach_tool(&binding.api.key(), &binding.tool_name);
                Some((binding.api.name.clone(), vec![binding.tool_name.clone()]))
            } else {
                None
            }
        };

        match removed {
            Some((api, tools)) => {
                info!(api = %api, tools = ?tools, "Unregistered API");
                let _ = self.changes.send(RegistryChange::Unregistered { api, tools });
                true
            }
            None => {
                debug!(name = %name, "Nothing registered under this name");
                false
            }
        }
    }

    /// Look up the API owning `name` (API name or generated tool name)
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<ApiDefinition>> {
        let key = tool_name_segment(name);
        let state = self.state.read();
        state
            .apis
            .get(&key)
            .map(|record| Arc::clone(&record.definition))
            .or_else(|| state.tools.get(&key).map(|b| Arc::clone(&b.api)))
    }

    /// All registered definitions, sorted by name
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ApiDefinition>> {
        let mut definitions: Vec<_> = self
            .state
            .read()
            .apis
            .values()
            .map(|record| Arc::clone(&record.definition))
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Invocation binding of a generated tool
    #[must_use]
    pub fn binding(&self, tool_name: &str) -> Option<Arc<ToolBinding>> {
        self.state.read().tools.get(tool_name).cloned()
    }

    /// Every generated tool name, sorted
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every binding, sorted by tool name
    #[must_use]
    pub fn bindings(&self) -> Vec<Arc<ToolBinding>> {
        let mut bindings: Vec<_> = self.state.read().tools.values().cloned().collect();
        bindings.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        bindings
    }

    /// Number of registered APIs
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().apis.len()
    }

    /// Whether no API is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().apis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_structured_value;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> RawApiDefinition {
        parse_structured_value(value).unwrap()
    }

    #[test]
    fn registers_flat_definition_under_api_name() {
        let registry = ApiRegistry::new();
        assert!(registry.register(&raw(json!({
            "name": "Weather Now",
            "url": "https://api.example.com/now"
        }))));

        assert_eq!(registry.tool_names(), vec!["weather_now"]);
        let binding = registry.binding("weather_now").unwrap();
        assert_eq!(binding.method().endpoint, "https://api.example.com/now");
        assert_eq!(registry.get_by_name("weather now").unwrap().name, "Weather Now");
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn registers_one_tool_per_method() {
        let registry = ApiRegistry::new();
        let tools = registry
            .register_value(&json!({
                "name": "github",
                "baseUrl": "https://api.github.com",
                "methods": [
                    {"name": "get user", "url": "/users/:login"},
                    {"name": "list repos", "url": "/users/:login/repos"}
                ]
            }))
            .unwrap();
        assert_eq!(tools, vec!["github_get_user", "github_list_repos"]);
        assert_eq!(registry.binding("github_list_repos").unwrap().method_index, 1);
        assert_eq!(registry.get_by_name("github_get_user").unwrap().name, "github");
    }

    #[test]
    fn invalid_definition_is_not_registered() {
        let registry = ApiRegistry::new();
        let bad = raw(json!({"name": "x", "url": "/x", "method": "TRACE"}));
        assert!(!registry.register(&bad));
        assert!(registry.is_empty());
    }

    #[test]
    fn re_registering_overwrites() {
        let registry = ApiRegistry::new();
        registry
            .register_value(&json!({"name": "w", "methods": [
                {"name": "a", "url": "/a"},
                {"name": "b", "url": "/b"}
            ]}))
            .unwrap();
        registry
            .register_value(&json!({"name": "w", "methods": [{"name": "a", "url": "/a2"}]}))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tool_names(), vec!["w_a"]);
        assert_eq!(registry.binding("w_a").unwrap().method().endpoint, "/a2");
    }

    #[test]
    fn tool_collision_across_apis_moves_ownership() {
        let registry = ApiRegistry::new();
        registry
            .register_value(&json!({"name": "w", "methods": [
                {"name": "now", "url": "/now"},
                {"name": "later", "url": "/later"}
            ]}))
            .unwrap();
        registry
            .register_value(&json!({"name": "w now", "url": "/other"}))
            .unwrap();

        assert_eq!(registry.get_by_name("w_now").unwrap().name, "w now");
        assert_eq!(registry.binding("w_later").unwrap().api.name, "w");
        assert_eq!(registry.len(), 2);

        registry
            .register_value(&json!({"name": "w later", "url": "/other"}))
            .unwrap();
        assert!(registry.get_by_name("w").is_none(), "emptied API is dropped");
    }

    #[test]
    fn unregister_by_api_or_tool_name() {
        let registry = ApiRegistry::new();
        registry
            .register_value(&json!({"name": "w", "methods": [
                {"name": "a", "url": "/a"},
                {"name": "b", "url": "/b"}
            ]}))
            .unwrap();

        assert!(registry.unregister("w_a"));
        assert!(registry.binding("w_a").is_none());
        assert_eq!(registry.tool_names(), vec!["w_b"]);

        assert!(registry.unregister("W"));
        assert!(registry.get_by_name("w").is_none());
        assert!(registry.is_empty());
        assert!(!registry.unregister("w"));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let registry = ApiRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register_value(&json!({"name": name, "url": "/x"}))
                .unwrap();
        }
        let names: Vec<_> = registry.list().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let registry = ApiRegistry::new();
        let mut changes = registry.subscribe();

        registry
            .register_value(&json!({"name": "ping", "url": "/ping"}))
            .unwrap();
        registry.unregister("ping");

        assert_eq!(
            changes.recv().await.unwrap(),
            RegistryChange::Registered {
                api: "ping".to_string(),
                tools: vec!["ping".to_string()]
            }
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            RegistryChange::Unregistered {
                api: "ping".to_string(),
                tools: vec!["ping".to_string()]
            }
        );
    }
}
