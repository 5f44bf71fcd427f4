//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// Outlinker - affiliate outbound link redirector
#[derive(Parser)]
#[command(name = "outlinker")]
#[command(version)]
#[command(about = "Affiliate outbound link redirector", long_about = None)]
pub struct Cli {
    /// Config file path (default: config.toml, optional)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands (no subcommand = serve)
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Append the configured affiliate tag to a URL
    Tag {
        /// Target URL (must be https)
        url: String,
    },

    /// Build an `/out?url=...` link for a product URL
    Link {
        /// Target URL (must be https)
        url: String,

        /// Extra tracking parameter, repeatable: -p utm_source=blog
        #[arg(long = "param", short = 'p', value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Site base URL (default: site.base_url from config)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Show source, product info and validation result for a URL
    Inspect {
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Show,
}

/// 解析 `key=value`
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}
