//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_API_DIR, Settings};

/// Web API MCP server - expose HTTP APIs described in JSON, YAML or markdown as MCP tools
#[derive(Parser, Debug)]
#[command(name = "webapi-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, env = "WEBAPI_MCP_DEBUG", global = true)]
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "WEBAPI_MCP_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "WEBAPI_MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Directory of API definitions loaded at startup
    #[arg(long, default_value = DEFAULT_API_DIR, env = "WEBAPI_MCP_API_DIR")]
    pub api_dir: PathBuf,

    /// Glob pattern restricting which files the startup load picks up
    #[arg(long, env = "WEBAPI_MCP_PATTERN")]
    pub pattern: Option<String>,

    /// Config file (JSON or YAML) loaded at startup instead of --api-dir
    #[arg(short, long, env = "WEBAPI_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Runtime settings derived from the flags
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            debug: self.debug,
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            api_dir: self.api_dir.clone(),
            pattern: self.pattern.clone(),
            config: self.config.clone(),
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the MCP server on stdio (default)
    Serve,

    /// Validate an API definition file
    Validate {
        /// Path to the definition (.json, .yaml, .yml, .md, .markdown)
        #[arg(required = true)]
        file: PathBuf,
    },

    /// List the APIs a directory would register
    List {
        /// Directory containing API definitions
        #[arg(default_value = DEFAULT_API_DIR)]
        directory: PathBuf,

        /// Glob pattern restricting which files are loaded
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Register one definition file and call one of its tools
    Call {
        /// Path to the definition
        #[arg(required = true)]
        file: PathBuf,

        /// Tool to call (defaults to the file's only tool)
        #[arg(short, long)]
        tool: Option<String>,

        /// JSON arguments passed to the tool
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Global header as NAME=VALUE (repeatable)
        #[arg(long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,
    },
}
