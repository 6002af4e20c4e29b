//! Configuration
//!
//! Two kinds of configuration exist:
//!
//! - [`Settings`]: runtime parameters of one process (log level, API
//!   directory, optional config document). Built by the CLI layer; the core
//!   never reads the environment itself.
//! - [`ApiConfigFile`]: the config document consumed by `load_from_config`
//!   (`apiDirectories`, `apiFiles`, `globalHeaders`), in JSON or YAML.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Format, Json, Yaml},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Default directory scanned for API definitions
pub const DEFAULT_API_DIR: &str = "apis";

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Force debug logging
    pub debug: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (text, json)
    pub log_format: Option<String>,
    /// Directory loaded at startup when no config document is given
    pub api_dir: PathBuf,
    /// Optional file pattern for the startup directory load
    pub pattern: Option<String>,
    /// Optional config document loaded at startup
    pub config: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            log_format: None,
            api_dir: PathBuf::from(DEFAULT_API_DIR),
            pattern: None,
            config: None,
        }
    }
}

impl Settings {
    /// Effective log level (`debug` wins over the configured level)
    #[must_use]
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

/// Config document for bulk loading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfigFile {
    /// Directories to load, relative to the config file
    #[serde(alias = "api_directories")]
    pub api_directories: Vec<String>,
    /// Individual definition files, relative to the config file
    #[serde(alias = "api_files")]
    pub api_files: Vec<String>,
    /// Headers merged into the global scope
    #[serde(alias = "global_headers", skip_serializing_if = "Option::is_none")]
    pub global_headers: Option<Value>,
}

impl ApiConfigFile {
    /// Load a config document
    ///
    /// # Errors
    ///
    /// Returns a load error if the file does not exist, its extension is not
    /// `.json`, `.yaml` or `.yml`, or it cannot be decoded.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Load(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let figment = match extension.as_deref() {
            Some("json") => Figment::new().merge(Json::file(path)),
            Some("yaml" | "yml") => Figment::new().merge(Yaml::file(path)),
            _ => {
                return Err(Error::Load(format!(
                    "Unsupported config file extension (expected .json, .yaml or .yml): {}",
                    path.display()
                )));
            }
        };

        figment
            .extract()
            .map_err(|e| Error::Load(format!("Invalid config file {}: {e}", path.display())))
    }

    /// Resolve a directory or file entry: `~` expands to the home
    /// directory and relative entries are joined onto `base`.
    #[must_use]
    pub fn resolve_entry(base: &Path, entry: &str) -> PathBuf {
        let expanded = match (entry.strip_prefix('~'), dirs::home_dir()) {
            (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
                home.join(rest.trim_start_matches('/'))
            }
            _ => PathBuf::from(entry),
        };

        if expanded.is_absolute() {
            expanded
        } else {
            base.join(expanded)
        }
    }
}
