//! CLI interface for revit-mcp
//!
//! Defines all commands and global flags using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// RevitMCP chat bridge
///
/// Connects LLM providers to a running Revit instance through the RevitMCP
/// listener plugin.
#[derive(Parser, Debug)]
#[command(name = "revit-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server
    Serve {
        /// Override the configured bind address (host:port)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Look for the Revit listener once and print the result
    Probe,

    /// Print the tool catalog
    Tools,

    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["revit-mcp", "probe"]);
        assert!(matches!(cli.command, Command::Probe));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["revit-mcp", "--json", "--log", "debug", "tools"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
        assert!(matches!(cli.command, Command::Tools));
    }

    #[test]
    fn test_serve_bind_override() {
        let cli = Cli::parse_from(["revit-mcp", "serve", "--bind", "0.0.0.0:9000"]);
        if let Command::Serve { bind } = cli.command {
            assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_config_path_flag() {
        let cli = Cli::parse_from(["revit-mcp", "config", "--config", "/tmp/revit.toml"]);
        assert!(matches!(cli.command, Command::Config));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/revit.toml")));
    }
}
