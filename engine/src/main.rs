// RevitMCP chat bridge
// Main entry point for the revit-mcp binary

use anyhow::Context;
use clap::Parser;
use revit_mcp_engine::cli::{Cli, Command};
use revit_mcp_engine::config::Config;
use revit_mcp_engine::handlers::{handle_config, handle_probe, handle_serve, handle_tools, OutputFormat};
use revit_mcp_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_create().context("Failed to load configuration")?,
    };

    // --log wins over the config level; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("RevitMCP v{} ({} - {})", version, commit, timestamp);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Serve { bind } => handle_serve(&config, bind, format).await,
        Command::Probe => handle_probe(&config, format).await,
        Command::Tools => handle_tools(format),
        Command::Config => handle_config(&config, format),
    }
}
