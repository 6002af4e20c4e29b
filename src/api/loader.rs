//! API definition directory and config loader

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::{ApiRegistry, DocumentFormat, HeaderScope, normalize_headers};
use crate::config::ApiConfigFile;
use crate::{Error, Result};

/// Outcome of a config-driven load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigLoadSummary {
    /// Definitions registered (directories and individual files)
    pub apis_loaded: usize,
    /// Directories that were walked
    pub directories: usize,
    /// Individual files that were attempted
    pub files: usize,
    /// Headers pushed into the global scope
    pub global_headers: usize,
}

/// Loader for API definitions from files, directories and config documents
pub struct ApiLoader;

impl ApiLoader {
    /// Load every definition under `path` into `registry`.
    ///
    /// Without a pattern, `*.json` files load first and `*.md`/`*.markdown`
    /// files second. A failing file is logged and skipped. Returns the number
    /// of definitions registered.
    ///
    /// # Errors
    ///
    /// Returns a load error if `path` is not a readable directory or the
    /// pattern is invalid.
    pub async fn load_directory(
        registry: &ApiRegistry,
        path: &Path,
        pattern: Option<&str>,
    ) -> Result<usize> {
        let files = Self::discover(path, pattern)?;

        let mut loaded = 0;
        for file in &files {
            match Self::load_file(registry, file).await {
                Ok(tools) => {
                    debug!(path = %file.display(), tools = ?tools, "Loaded API definition");
                    loaded += 1;
                }
                Err(e) => {
                    error!(path = %file.display(), error = %e, "Failed to load API definition");
                }
            }
        }

        info!(
            count = loaded,
            candidates = files.len(),
            path = %path.display(),
            "Loaded API definitions"
        );
        Ok(loaded)
    }

    /// List the files `load_directory` would process, in processing order
    ///
    /// # Errors
    ///
    /// Returns a load error if `path` is not a directory or the pattern is
    /// invalid.
    pub fn discover(path: &Path, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
        if !path.exists() {
            return Err(Error::Load(format!(
                "API directory does not exist: {}",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(Error::Load(format!(
                "API path is not a directory: {}",
                path.display()
            )));
        }

        let pattern = pattern
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::Load(format!("Invalid file pattern '{p}': {e}")))
            })
            .transpose()?;

        let files = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path);

        let Some(pattern) = pattern else {
            let (json, markup): (Vec<_>, Vec<_>) = files
                .filter_map(|file| match DocumentFormat::from_path(&file) {
                    Some(DocumentFormat::Json) => Some((true, file)),
                    Some(DocumentFormat::Markdown) => Some((false, file)),
                    _ => None,
                })
                .partition(|(is_json, _)| *is_json);
            return Ok(json.into_iter().chain(markup).map(|(_, f)| f).collect());
        };

        Ok(files
            .filter(|file| {
                let relative = file.strip_prefix(path).unwrap_or(file);
                let by_name = file
                    .file_name()
                    .is_some_and(|name| pattern.matches(&name.to_string_lossy()));
                pattern.matches_path(relative) || by_name
            })
            .filter(|file| {
                let supported = DocumentFormat::from_path(file).is_some();
                if !supported {
                    warn!(path = %file.display(), "Skipping file with unsupported extension");
                }
                supported
            })
            .collect())
    }

    /// Parse, normalize and register one definition file.
    ///
    /// Returns the generated tool names.
    ///
    /// # Errors
    ///
    /// Returns a load error when the file cannot be read, has an unsupported
    /// extension or does not parse, and a validation error when it does not
    /// normalize.
    pub async fn load_file(registry: &ApiRegistry, path: &Path) -> Result<Vec<String>> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            Error::Load(format!(
                "Unsupported API definition file extension: {}",
                path.display()
            ))
        })?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Load(format!("Failed to read {}: {e}", path.display())))?;

        let raw = format.parse(&content).ok_or_else(|| {
            Error::Load(format!(
                "No API definition could be parsed from {}",
                path.display()
            ))
        })?;

        registry.try_register(&raw)
    }

    /// Load a config document: push its global headers, then load its
    /// directories and files.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is missing, has an unsupported
    /// extension, cannot be decoded or declares malformed global headers.
    /// Entries that fail individually are logged and skipped.
    pub async fn load_config(
        registry: &ApiRegistry,
        headers: &HeaderScope,
        path: &Path,
    ) -> Result<ConfigLoadSummary> {
        let config = ApiConfigFile::load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut summary = ConfigLoadSummary::default();

        let global = normalize_headers(config.global_headers.as_ref(), "globalHeaders")?;
        if !global.is_empty() {
            headers.merge(&global);
            summary.global_headers = global.len();
            info!(count = global.len(), "Applied global headers from config");
        }

        for entry in &config.api_directories {
            let dir = ApiConfigFile::resolve_entry(base, entry);
            if !dir.is_dir() {
                warn!(path = %dir.display(), "Configured API directory not found, skipping");
                continue;
            }
            match Self::load_directory(registry, &dir, None).await {
                Ok(count) => {
                    summary.apis_loaded += count;
                    summary.directories += 1;
                }
                Err(e) => error!(path = %dir.display(), error = %e, "Failed to load API directory"),
            }
        }

        for entry in &config.api_files {
            let file = ApiConfigFile::resolve_entry(base, entry);
            if !file.is_file() {
                warn!(path = %file.display(), "Configured API file not found, skipping");
                continue;
            }
            summary.files += 1;
            match Self::load_file(registry, &file).await {
                Ok(_) => summary.apis_loaded += 1,
                Err(e) => error!(path = %file.display(), error = %e, "Failed to load API definition"),
            }
        }

        info!(
            path = %path.display(),
            apis = summary.apis_loaded,
            directories = summary.directories,
            files = summary.files,
            "Loaded API config"
        );
        Ok(summary)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    const PING_JSON: &str = r#"{"name": "ping", "url": "https://example.com/ping"}"#;
    const PONG_MD: &str = "## API Name\npong\n## URL\nhttps://example.com/pong\n";

    #[test]
    fn discovers_json_before_markdown() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", PONG_MD);
        write(dir.path(), "nested/b.json", PING_JSON);
        write(dir.path(), "c.json", PING_JSON);
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), ".hidden/d.json", PING_JSON);

        let files = ApiLoader::discover(dir.path(), None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c.json", "nested/b.json", "a.md"]);
    }

    #[test]
    fn pattern_matches_relative_path_or_file_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "weather/current.yaml", "name: w\nurl: /w\n");
        write(dir.path(), "weather/readme.txt", "no");
        write(dir.path(), "other.json", PING_JSON);

        let files = ApiLoader::discover(dir.path(), Some("weather/*")).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("weather/current.yaml"));

        let files = ApiLoader::discover(dir.path(), Some("*.json")).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("other.json"));
    }

    #[test]
    fn missing_directory_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let err = ApiLoader::discover(&dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, Error::Load(_)));

        let file = write(dir.path(), "f.json", PING_JSON);
        assert!(matches!(ApiLoader::discover(&file, None), Err(Error::Load(_))));
        assert!(matches!(
            ApiLoader::discover(dir.path(), Some("[")),
            Err(Error::Load(_))
        ));
    }

    #[tokio::test]
    async fn load_file_reports_failures() {
        let dir = TempDir::new().unwrap();
        let registry = ApiRegistry::new();

        let txt = write(dir.path(), "a.txt", PING_JSON);
        assert!(matches!(
            ApiLoader::load_file(&registry, &txt).await,
            Err(Error::Load(_))
        ));

        let broken = write(dir.path(), "b.json", "{ nope");
        assert!(matches!(
            ApiLoader::load_file(&registry, &broken).await,
            Err(Error::Load(_))
        ));

        let invalid = write(dir.path(), "c.json", r#"{"name": "x", "url": "/x", "method": "FETCH"}"#);
        assert!(matches!(
            ApiLoader::load_file(&registry, &invalid).await,
            Err(Error::Validation(_))
        ));

        let good = write(dir.path(), "d.json", PING_JSON);
        assert_eq!(
            ApiLoader::load_file(&registry, &good).await.unwrap(),
            vec!["ping"]
        );
    }

    #[tokio::test]
    async fn malformed_markdown_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.json", PING_JSON);
        write(dir.path(), "bad.md", "# Nothing useful here\n");

        let registry = ApiRegistry::new();
        let count = ApiLoader::load_directory(&registry, dir.path(), None)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(registry.get_by_name("ping").is_some());
    }

    #[tokio::test]
    async fn load_config_resolves_relative_entries() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "apis/ping.json", PING_JSON);
        write(dir.path(), "extra/pong.md", PONG_MD);
        let config = write(
            dir.path(),
            "conf/webapi.json",
            r#"{
                "apiDirectories": ["../apis", "../missing"],
                "apiFiles": ["../extra/pong.md", "../extra/absent.json"],
                "globalHeaders": {"X-Team": "core", "X-Version": 3}
            }"#,
        );

        let registry = ApiRegistry::new();
        let headers = HeaderScope::new();
        let summary = ApiLoader::load_config(&registry, &headers, &config)
            .await
            .unwrap();

        assert_eq!(
            summary,
            ConfigLoadSummary {
                apis_loaded: 2,
                directories: 1,
                files: 1,
                global_headers: 2,
            }
        );
        assert_eq!(
            headers.snapshot().get("X-Version").map(String::as_str),
            Some("3")
        );
        assert_eq!(registry.tool_names(), vec!["ping", "pong"]);
    }

    #[tokio::test]
    async fn load_config_rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let config = write(dir.path(), "webapi.toml", "apiFiles = []");
        let err = ApiLoader::load_config(&ApiRegistry::new(), &HeaderScope::new(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Load(_)));

        let missing = dir.path().join("absent.json");
        let err = ApiLoader::load_config(&ApiRegistry::new(), &HeaderScope::new(), &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }
}
