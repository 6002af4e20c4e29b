//! Web API definitions bound as MCP tools
//!
//! Declarative API definitions (JSON, YAML or markdown) are parsed,
//! normalized and registered. Every method of a registered API becomes a
//! tool that validates its arguments and performs the described HTTP call.
//!
//! # Example definition
//!
//! ```json
//! {
//!   "name": "weather",
//!   "description": "Current weather for a city",
//!   "url": "https://api.example.com/v1/current",
//!   "method": "GET",
//!   "parameters": {
//!     "city": {"type": "string", "required": true, "description": "City name"}
//!   },
//!   "headers": {"X-Api-Key": "..."},
//!   "resultPath": "data.current"
//! }
//! ```

mod backend;
mod builtin;
mod definition;
mod executor;
mod loader;
mod markdown;
mod parser;
mod registry;
mod schema;
mod validator;

pub use backend::{ApiBackend, normalize_arguments};
pub use builtin::{MANAGEMENT_TOOLS, is_management_tool, management_tools};
pub use definition::*;
pub use executor::{
    HeaderScope, RequestExecutor, extract_path, flatten_pairs, join_url, merge_headers,
    resolve_url,
};
pub use loader::{ApiLoader, ConfigLoadSummary};
pub use markdown::parse_markup;
pub use parser::{DocumentFormat, parse_structured, parse_structured_value, parse_yaml};
pub use registry::{ApiRegistry, RegistryChange, ToolBinding};
pub use schema::{
    ArgumentSchema, FieldSchema, SchemaValidationResult, ValidationViolation, build_schema,
};
pub use validator::{coerce_required, normalize, normalize_headers, normalize_value};
