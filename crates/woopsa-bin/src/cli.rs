// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command-line interface.
//!
//! - `run`: serve the configured model (default)
//! - `validate`: check a configuration file
//! - `version`: show component versions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use woopsa_config::LoggingConfig;

/// Woopsa server with long-poll subscriptions.
#[derive(Parser, Debug)]
#[command(
    name = "woopsa",
    author = "Sylvex <contact@sylvex.io>",
    version = woopsa_core::VERSION,
    about = "Woopsa server with long-poll subscriptions",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "woopsa.yaml", env = "WOOPSA_CONFIG", global = true)]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the file
    #[arg(long, env = "WOOPSA_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the server (default)
    Run,

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Print the parsed configuration
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON lines
    Json,
    /// Compact single lines
    Compact,
}

impl From<woopsa_config::LogFormat> for LogFormat {
    fn from(format: woopsa_config::LogFormat) -> Self {
        match format {
            woopsa_config::LogFormat::Text => LogFormat::Text,
            woopsa_config::LogFormat::Json => LogFormat::Json,
            woopsa_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

impl Cli {
    /// The subcommand, defaulting to `run`.
    pub fn effective_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Level from the flags, falling back to the file's logging section.
    pub fn effective_log_level(&self, file: &LoggingConfig) -> String {
        if self.quiet {
            return "warn".to_string();
        }
        self.log_level
            .clone()
            .unwrap_or_else(|| file.level.as_str().to_string())
    }

    /// Format from the flags, falling back to the file's logging section.
    pub fn effective_log_format(&self, file: &LoggingConfig) -> LogFormat {
        self.log_format.unwrap_or_else(|| file.format.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woopsa_config::LogLevel;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["woopsa"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["woopsa", "validate", "--show-config", "-f", "json"]);
        match cli.command {
            Some(Commands::Validate(args)) => {
                assert!(args.show_config);
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("expected validate, got {:?}", other),
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["woopsa", "-c", "/etc/woopsa/plant.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/woopsa/plant.toml"));
    }

    #[test]
    fn test_log_level_precedence() {
        let file = LoggingConfig {
            level: LogLevel::Debug,
            format: woopsa_config::LogFormat::Json,
        };

        let cli = Cli::parse_from(["woopsa"]);
        assert_eq!(cli.effective_log_level(&file), "debug");
        assert_eq!(cli.effective_log_format(&file), LogFormat::Json);

        let cli = Cli::parse_from(["woopsa", "-l", "trace", "--log-format", "compact"]);
        assert_eq!(cli.effective_log_level(&file), "trace");
        assert_eq!(cli.effective_log_format(&file), LogFormat::Compact);

        let cli = Cli::parse_from(["woopsa", "-q", "-l", "trace"]);
        assert_eq!(cli.effective_log_level(&file), "warn");
    }
}
