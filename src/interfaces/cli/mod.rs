//! CLI interface module

pub mod commands;

use std::fmt;

use crate::cli::{Commands, ConfigCommands};
use crate::config::StaticConfig;
use commands::{config_management, inspect_url, link_url, tag_url};

#[derive(Debug)]
pub enum CliError {
    ParseError(String),
    CommandError(String),
}

impl CliError {
    pub fn format_simple(&self) -> String {
        match self {
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<crate::errors::OutlinkerError> for CliError {
    fn from(err: crate::errors::OutlinkerError) -> Self {
        match err {
            crate::errors::OutlinkerError::InvalidUrl(msg) => CliError::ParseError(msg),
            other => CliError::CommandError(other.to_string()),
        }
    }
}

/// 执行一条 CLI 命令（`serve` 由 main 处理）
pub fn run_cli_command(cmd: Commands, config: &StaticConfig) -> Result<(), CliError> {
    match cmd {
        Commands::Tag { url } => tag_url(config, &url),
        Commands::Link {
            url,
            params,
            base_url,
        } => link_url(config, &url, &params, base_url.as_deref()),
        Commands::Inspect { url, json } => inspect_url(&url, json),
        Commands::Config { action } => match action {
            ConfigCommands::Generate { output_path, force } => {
                config_management::config_generate(output_path, force)
            }
            ConfigCommands::Show => config_management::config_show(config),
        },
        Commands::Serve => Err(CliError::CommandError(
            "serve is not a CLI command".to_string(),
        )),
    }
}
