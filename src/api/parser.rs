//! Structured-data definition parser (JSON, YAML)
//!
//! Parsers never fail loudly: anything that cannot be decoded, or that lacks
//! a name and an endpoint, yields `None` and a logged diagnostic.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::RawApiDefinition;
use super::markdown::parse_markup;

/// Document formats understood by the definition parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.md` / `.markdown`
    Markdown,
}

impl DocumentFormat {
    /// Pick the format from a file extension (case-insensitive)
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Parse `content` with the parser matching this format
    #[must_use]
    pub fn parse(self, content: &str) -> Option<RawApiDefinition> {
        match self {
            Self::Json => parse_structured(content),
            Self::Yaml => parse_yaml(content),
            Self::Markdown => parse_markup(content),
        }
    }
}

/// Parse a JSON API definition from raw text
pub fn parse_structured(content: &str) -> Option<RawApiDefinition> {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => parse_structured_value(value),
        Err(e) => {
            warn!(error = %e, "Failed to decode JSON API definition");
            None
        }
    }
}

/// Parse a YAML API definition from raw text
pub fn parse_yaml(content: &str) -> Option<RawApiDefinition> {
    match serde_yaml::from_str::<Value>(content) {
        Ok(value) => parse_structured_value(value),
        Err(e) => {
            warn!(error = %e, "Failed to decode YAML API definition");
            None
        }
    }
}

/// Parse an already-decoded API definition
pub fn parse_structured_value(value: Value) -> Option<RawApiDefinition> {
    let raw = match RawApiDefinition::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Malformed API definition document");
            return None;
        }
    };

    if !raw.has_identity() {
        warn!(
            name = raw.name.as_deref().unwrap_or(""),
            "API definition is missing its name or endpoint"
        );
        return None;
    }

    debug!(name = raw.name.as_deref().unwrap_or(""), "Parsed API definition");
    Some(raw)
}
