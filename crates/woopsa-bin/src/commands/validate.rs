// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

use woopsa_config::WoopsaConfig;

/// Loads the configuration file and reports problems.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = woopsa_config::load_config(config_path).map_err(|e| {
        BinError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    let warnings = validation_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Server name: {}", config.server.name);
            println!("  API: {}{}", config.api.socket_addr(), config.api.base_path);
            println!("  Properties: {}", config.model.properties.len());
            println!("  Upstreams: {}", config.model.upstreams.len());
            println!(
                "  Channel lifetime: {}",
                humantime::format_duration(config.subscription_settings().channel_lifetime)
            );
            println!(
                "  Wait timeout: {}",
                humantime::format_duration(config.subscription_settings().wait_timeout)
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let mut output = serde_json::json!({
                "valid": true,
                "path": config_path.display().to_string(),
                "summary": {
                    "server_name": config.server.name,
                    "api": config.api.socket_addr().to_string(),
                    "base_path": config.api.base_path,
                    "properties": config.model.properties.len(),
                    "upstreams": config.model.upstreams.len(),
                },
                "warnings": warnings,
            });
            if args.show_config {
                output["config"] = serde_json::to_value(&config).unwrap_or_default();
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "{} warning(s) in strict mode",
            warnings.len()
        )));
    }

    Ok(())
}

/// Problems that do not make the configuration invalid.
pub fn validation_warnings(config: &WoopsaConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.model.properties.is_empty() && config.model.upstreams.is_empty() {
        warnings.push("The object model is empty".to_string());
    }

    let wait_timeout = config.subscription_settings().wait_timeout;
    if config.api.request_timeout() <= wait_timeout {
        warnings.push(format!(
            "api.request_timeout ({}) does not exceed the wait timeout ({}); long polls will be cut off",
            humantime::format_duration(config.api.request_timeout()),
            humantime::format_duration(wait_timeout)
        ));
    }

    if config.client.request_timeout() <= wait_timeout && !config.model.upstreams.is_empty() {
        warnings.push(format!(
            "client.request_timeout ({}) does not exceed the wait timeout ({})",
            humantime::format_duration(config.client.request_timeout()),
            humantime::format_duration(wait_timeout)
        ));
    }

    let mut paths: Vec<&str> = config.model.properties.iter().map(|p| p.path.as_str()).collect();
    paths.sort_unstable();
    for pair in paths.windows(2) {
        if pair[0] == pair[1] {
            warnings.push(format!("Property '{}' is defined more than once", pair[0]));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use clap::Parser;
    use woopsa_config::{ConfigFormat, ConfigLoader};

    fn parse(yaml: &str) -> WoopsaConfig {
        ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap()
    }

    #[test]
    fn test_empty_model_warns() {
        let warnings = validation_warnings(&WoopsaConfig::default());
        assert!(warnings.iter().any(|w| w.contains("empty")));
    }

    #[test]
    fn test_short_request_timeout_warns() {
        let config = parse(
            r#"
api:
  request_timeout: 1
model:
  properties:
    - path: Votes
      value: 0
"#,
        );
        let warnings = validation_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("api.request_timeout"));
    }

    #[test]
    fn test_duplicate_property_warns() {
        let config = parse(
            r#"
model:
  properties:
    - path: Votes
      value: 0
    - path: Votes
      value: 1
"#,
        );
        let warnings = validation_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("more than once")));
    }

    #[test]
    fn test_missing_file_is_error() {
        let cli = Cli::parse_from(["woopsa", "-c", "/nonexistent/woopsa.yaml", "validate"]);
        let err = validate(&cli, ValidateArgs::default()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_strict_fails_on_warnings() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  name: plant").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["woopsa", "-c", &path, "validate"]);
        assert!(validate(&cli, ValidateArgs::default()).is_ok());

        let strict = ValidateArgs {
            strict: true,
            ..ValidateArgs::default()
        };
        assert!(validate(&cli, strict).is_err());
    }
}
