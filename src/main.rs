//! Web API MCP server - HTTP APIs described in JSON, YAML or markdown as MCP tools

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use webapi_mcp::{
    api::{ApiBackend, ApiLoader, ApiRegistry, DocumentFormat, join_url, normalize},
    cli::{Cli, Command},
    config::Settings,
    server::StdioServer,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = cli.settings();

    // Setup tracing
    if let Err(e) = setup_tracing(
        settings.effective_log_level(),
        settings.log_format.as_deref(),
    ) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // Handle subcommands
    match cli.command {
        Some(Command::Validate { file }) => run_validate(&file).await,
        Some(Command::List { directory, pattern }) => {
            run_list(&directory, pattern.as_deref()).await
        }
        Some(Command::Call {
            file,
            tool,
            args,
            headers,
        }) => run_call(&file, tool.as_deref(), &args, &headers).await,
        Some(Command::Serve) | None => run_server(&settings).await,
    }
}

/// Parse and normalize one definition file
async fn run_validate(file: &Path) -> ExitCode {
    let Some(format) = DocumentFormat::from_path(file) else {
        eprintln!("❌ Unsupported file extension: {}", file.display());
        return ExitCode::FAILURE;
    };

    let content = match tokio::fs::read_to_string(file).await {
        Ok(content) => content,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {e}", file.display());
            return ExitCode::FAILURE;
        }
    };

    let Some(raw) = format.parse(&content) else {
        eprintln!("❌ Failed to parse: no name or endpoint found");
        return ExitCode::FAILURE;
    };

    match normalize(&raw) {
        Ok(api) => {
            println!("✅ {} - valid", api.name);
            println!("   {}", api.description);
            for method in &api.methods {
                println!(
                    "   {}: {} {}",
                    api.tool_name(method),
                    method.method,
                    join_url(api.base_url.as_deref(), &method.endpoint)
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Validation failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load a directory into a scratch registry and print what it contains
async fn run_list(directory: &Path, pattern: Option<&str>) -> ExitCode {
    let registry = ApiRegistry::new();
    match ApiLoader::load_directory(&registry, directory, pattern).await {
        Ok(0) => {
            println!("No APIs found in {}", directory.display());
            ExitCode::SUCCESS
        }
        Ok(count) => {
            println!("Found {count} APIs in {}:\n", directory.display());
            for api in registry.list() {
                println!("  {} - {}", api.name, api.description);
                for tool in api.tool_names() {
                    println!("    - {tool}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to load: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Register one file and call one of its tools
async fn run_call(file: &Path, tool: Option<&str>, args: &str, headers: &[String]) -> ExitCode {
    let backend = match ApiBackend::new() {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut global = BTreeMap::new();
    for header in headers {
        let Some((name, value)) = header.split_once('=') else {
            eprintln!("❌ Invalid header '{header}' (expected NAME=VALUE)");
            return ExitCode::FAILURE;
        };
        global.insert(name.trim().to_string(), value.trim().to_string());
    }
    backend.set_default_headers(&global);

    let tools = match backend.load_file(file).await {
        Ok(tools) => tools,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {e}", file.display());
            return ExitCode::FAILURE;
        }
    };

    let tool = match (tool, tools.as_slice()) {
        (Some(tool), _) => tool.to_string(),
        (None, [only]) => only.clone(),
        (None, _) => {
            eprintln!(
                "❌ {} defines several tools, pick one with --tool: {}",
                file.display(),
                tools.join(", ")
            );
            return ExitCode::FAILURE;
        }
    };

    let arguments = match serde_json::from_str(args) {
        Ok(arguments) => arguments,
        Err(e) => {
            eprintln!("❌ Invalid JSON arguments: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = backend.call_tool(&tool, arguments).await;
    if result.is_error {
        eprintln!("❌ {}", result.text_content());
        ExitCode::FAILURE
    } else {
        println!("{}", result.text_content());
        ExitCode::SUCCESS
    }
}

/// Run the MCP server on stdio
async fn run_server(settings: &Settings) -> ExitCode {
    let backend = match ApiBackend::new() {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!(error = %e, "Failed to create backend");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref config) = settings.config {
        match backend.load_config(config).await {
            Ok(summary) => info!(
                apis = summary.apis_loaded,
                path = %config.display(),
                "Loaded startup config"
            ),
            Err(e) => {
                error!(error = %e, path = %config.display(), "Failed to load startup config");
                return ExitCode::FAILURE;
            }
        }
    } else if settings.api_dir.is_dir() {
        if let Err(e) = backend
            .load_directory(&settings.api_dir, settings.pattern.as_deref())
            .await
        {
            warn!(error = %e, path = %settings.api_dir.display(), "Failed to load API directory");
        }
    } else {
        info!(
            path = %settings.api_dir.display(),
            "API directory not found, starting with no registered APIs"
        );
    }

    match StdioServer::new(backend).run().await {
        Ok(()) => {
            info!("Server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
