//! Management tool descriptors

use serde_json::json;

use crate::protocol::{Tool, ToolAnnotations};

/// `register_web_api`
pub const REGISTER_WEB_API: &str = "register_web_api";
/// `set_default_headers`
pub const SET_DEFAULT_HEADERS: &str = "set_default_headers";
/// `list_registered_apis`
pub const LIST_REGISTERED_APIS: &str = "list_registered_apis";
/// `unregister_api`
pub const UNREGISTER_API: &str = "unregister_api";
/// `load_api_from_file`
pub const LOAD_API_FROM_FILE: &str = "load_api_from_file";
/// `load_apis_from_directory`
pub const LOAD_APIS_FROM_DIRECTORY: &str = "load_apis_from_directory";
/// `load_from_config`
pub const LOAD_FROM_CONFIG: &str = "load_from_config";

/// Names of every management tool, in listing order
pub const MANAGEMENT_TOOLS: [&str; 7] = [
    REGISTER_WEB_API,
    SET_DEFAULT_HEADERS,
    LIST_REGISTERED_APIS,
    UNREGISTER_API,
    LOAD_API_FROM_FILE,
    LOAD_APIS_FROM_DIRECTORY,
    LOAD_FROM_CONFIG,
];

/// Whether `name` is a management tool
#[must_use]
pub fn is_management_tool(name: &str) -> bool {
    MANAGEMENT_TOOLS.contains(&name)
}

fn mutating() -> Option<ToolAnnotations> {
    Some(ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(false),
        open_world_hint: Some(false),
    })
}

/// Descriptors of the management tools
#[must_use]
pub fn management_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: REGISTER_WEB_API.to_string(),
            description: Some(
                "Register a web API as a new tool. The API becomes callable under its \
                 normalized name."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "API name (becomes the tool name)"},
                    "url": {"type": "string", "description": "Endpoint URL; may contain :param placeholders"},
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"],
                        "description": "HTTP method (default GET)"
                    },
                    "description": {"type": "string", "description": "What the API does"},
                    "parameters": {
                        "type": "object",
                        "description": "Parameter declarations: {name: {type, required, description, default}}"
                    },
                    "headers": {"type": "object", "description": "Headers sent with every call"},
                    "resultPath": {"type": "string", "description": "Dot path extracted from the response body"},
                    "timeout": {"type": "number", "description": "Timeout in milliseconds (default 30000)"},
                    "responseType": {"type": "string", "enum": ["json", "text"], "description": "Response body handling"}
                },
                "required": ["name", "url"]
            }),
            annotations: mutating(),
        },
        Tool {
            name: SET_DEFAULT_HEADERS.to_string(),
            description: Some("Merge headers into the set sent with every API call.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "headers": {"type": "object", "description": "Header name to value"}
                },
                "required": ["headers"]
            }),
            annotations: mutating(),
        },
        Tool {
            name: LIST_REGISTERED_APIS.to_string(),
            description: Some("List every registered API definition.".to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(true),
                destructive_hint: None,
                open_world_hint: Some(false),
            }),
        },
        Tool {
            name: UNREGISTER_API.to_string(),
            description: Some(
                "Remove a registered API (by API name) or one generated tool (by tool name)."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "API or tool name"}
                },
                "required": ["name"]
            }),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(false),
                destructive_hint: Some(true),
                open_world_hint: Some(false),
            }),
        },
        Tool {
            name: LOAD_API_FROM_FILE.to_string(),
            description: Some(
                "Load one API definition file (.json, .yaml, .yml, .md, .markdown).".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filePath": {"type": "string", "description": "Path to the definition file"}
                },
                "required": ["filePath"]
            }),
            annotations: mutating(),
        },
        Tool {
            name: LOAD_APIS_FROM_DIRECTORY.to_string(),
            description: Some(
                "Load every API definition in a directory (recursive). Without a pattern, \
                 JSON files load first, then markdown files."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "directory": {"type": "string", "description": "Directory to scan"},
                    "pattern": {"type": "string", "description": "Optional glob, e.g. \"weather/*.json\""}
                },
                "required": ["directory"]
            }),
            annotations: mutating(),
        },
        Tool {
            name: LOAD_FROM_CONFIG.to_string(),
            description: Some(
                "Load APIs from a config file (apiDirectories, apiFiles, globalHeaders).".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "configFile": {"type": "string", "description": "Path to a .json, .yaml or .yml config file"}
                },
                "required": ["configFile"]
            }),
            annotations: mutating(),
        },
    ]
}
