// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` and `${VAR:default}` placeholders in the raw text
//! 3. Parse into [`WoopsaConfig`]
//! 4. Apply environment overrides
//! 5. Validate
//!
//! # Environment Overrides
//!
//! ```text
//! WOOPSA_API_PORT=9090
//! WOOPSA_LOG_LEVEL=debug
//! WOOPSA_CHANNEL_LIFETIME_SECS=120
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use woopsa_core::error::{ConfigError, ConfigResult};

use crate::schema::{LogLevel, WoopsaConfig};

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "WOOPSA";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`WoopsaConfig`] from files or strings.
///
/// # Examples
///
/// ```no_run
/// use woopsa_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("woopsa.yaml").unwrap();
/// println!("listening on {}", config.api.socket_addr());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `WOOPSA` prefix and placeholders enabled.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the override variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads and validates a configuration file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<WoopsaConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let mut config = self
            .parse_str(&content, format)
            .map_err(|e| match e {
                ConfigError::Parse { message, .. } => ConfigError::parse(path, message),
                other => other,
            })?;
        self.finish(&mut config)?;

        debug!(
            properties = config.model.properties.len(),
            upstreams = config.model.upstreams.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates configuration text.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<WoopsaConfig> {
        let mut config = self.parse_str(content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn parse_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<WoopsaConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        match format {
            ConfigFormat::Yaml => parse_yaml(&content),
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| ConfigError::parse("<toml>", e.to_string())),
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| ConfigError::parse("<json>", e.to_string()))
            }
        }
    }

    fn finish(&self, config: &mut WoopsaConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_env_overrides(config)?;
        }
        config.validate()
    }

    fn apply_env_overrides(&self, config: &mut WoopsaConfig) -> ConfigResult<()> {
        let name = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        let port_var = name("API_PORT");
        if let Ok(value) = env::var(&port_var) {
            config.api.port = value
                .parse()
                .map_err(|_| ConfigError::validation(port_var.clone(), "expected a port number"))?;
            debug!(var = %port_var, port = config.api.port, "Override applied");
        }

        let level_var = name("LOG_LEVEL");
        if let Ok(value) = env::var(&level_var) {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!(var = %level_var, value = %value, "Ignoring unknown log level"),
            }
        }

        let lifetime_var = name("CHANNEL_LIFETIME_SECS");
        if let Ok(value) = env::var(&lifetime_var) {
            config.subscription.channel_lifetime_secs = value
                .parse()
                .map_err(|_| ConfigError::validation(lifetime_var.clone(), "expected seconds"))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
///
/// Unset variables without a default are left in place.
pub fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let placeholder = &after[..end];
        let (var, default) = match placeholder.split_once(':') {
            Some((var, default)) => (var, Some(default)),
            None => (placeholder, None),
        };

        match (env::var(var), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(var = %var, "Environment variable not set");
                result.push_str(&rest[start..start + end + 3]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::parse("<yaml>", e.to_string()))
}

/// Loads a configuration file with the default loader.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<WoopsaConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            other => Err(ConfigError::parse(
                path,
                format!("unsupported format: {}", other.unwrap_or("(no extension)")),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::Builder;
    use woopsa_core::types::Value;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn loader(prefix: &str) -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(prefix)
    }

    #[test]
    fn test_load_yaml() {
        let file = write_temp(
            ".yaml",
            r#"
server:
  name: plant
api:
  port: 9000
subscription:
  wait_timeout_ms: 2000
model:
  properties:
    - path: Line1/Speed
      value: 3
      type: Real
    - path: Line1/Label
      value: conveyor
      writable: false
  upstreams:
    - path: Remote
      url: http://remote:8080/woopsa
"#,
        );
        let config = loader("WOOPSA_TEST_YAML").load(file.path()).unwrap();

        assert_eq!(config.server.name, "plant");
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.subscription_settings().wait_timeout, Duration::from_secs(2));
        assert_eq!(config.model.properties.len(), 2);
        assert_eq!(config.model.properties[0].path, "Line1/Speed");
        assert_eq!(config.model.properties[0].initial_value().unwrap(), Value::Real(3.0));
        assert!(!config.model.properties[1].writable);
        assert_eq!(config.model.upstreams[0].url, "http://remote:8080/woopsa");
    }

    #[test]
    fn test_load_toml_and_json() {
        let toml = write_temp(".toml", "[api]\nport = 9100\n");
        assert_eq!(loader("WOOPSA_TEST_TOML").load(toml.path()).unwrap().api.port, 9100);

        let json = write_temp(".json", r#"{"api": {"port": 9200}}"#);
        assert_eq!(loader("WOOPSA_TEST_JSON").load(json.path()).unwrap().api.port, 9200);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = loader("WOOPSA_TEST_UNKNOWN").load_from_str("{\"api\": {\"prot\": 1}}", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".ini", "port=1");
        assert!(matches!(ConfigLoader::new().load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new().load("/nonexistent/woopsa.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_placeholders() {
        env::set_var("WOOPSA_TEST_PLACEHOLDER_NAME", "line-7");
        let resolved = resolve_env_placeholders(
            "name: ${WOOPSA_TEST_PLACEHOLDER_NAME}, port: ${WOOPSA_TEST_UNSET_PORT:8081}, x: ${WOOPSA_TEST_UNSET}",
        );
        assert_eq!(resolved, "name: line-7, port: 8081, x: ${WOOPSA_TEST_UNSET}");
        assert_eq!(resolve_env_placeholders("open ${brace"), "open ${brace");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("WOOPSA_TEST_OVR_API_PORT", "9300");
        env::set_var("WOOPSA_TEST_OVR_LOG_LEVEL", "debug");
        env::set_var("WOOPSA_TEST_OVR_CHANNEL_LIFETIME_SECS", "120");

        let config = loader("WOOPSA_TEST_OVR").load_from_str("{}", ConfigFormat::Json).unwrap();
        assert_eq!(config.api.port, 9300);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.subscription.channel_lifetime_secs, 120);
    }

    #[test]
    fn test_bad_override_is_validation_error() {
        env::set_var("WOOPSA_TEST_BAD_API_PORT", "not-a-port");
        let result = loader("WOOPSA_TEST_BAD").load_from_str("{}", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_validation_runs_after_load() {
        let result = loader("WOOPSA_TEST_INVALID").load_from_str(
            r#"{"subscription": {"notification_id_min": 10, "notification_id_max": 5}}"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }
}
