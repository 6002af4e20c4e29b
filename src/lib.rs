//! Web API MCP Server Library
//!
//! Turns declarative web API definitions into MCP tools.
//!
//! # Features
//!
//! - **Definitions**: JSON, YAML and markdown documents, flat or multi-method
//! - **Registry**: one generated tool per API method, hot (un)registration
//! - **Executor**: URL templating, header scopes, timeouts, result extraction
//! - **Loader**: recursive directory loading and config-driven bulk loads
//! - **Stdio server**: MCP over newline-delimited JSON-RPC
//!
//! # Protocol Version
//!
//! Implements MCP protocol versions 2024-11-05 through 2025-11-25.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use error::{ApiCallError, Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging.
///
/// Logs go to stderr; stdout carries the protocol stream.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}
