// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! Every section has defaults, so an empty file is a valid configuration:
//!
//! ```yaml
//! server:
//!   name: plant
//! api:
//!   port: 8080
//!   base_path: /woopsa
//! subscription:
//!   channel_lifetime_secs: 60
//!   wait_timeout_ms: 5000
//! model:
//!   properties:
//!     - path: Line1/Speed
//!       value: 0
//!       type: Real
//!   upstreams:
//!     - path: Remote
//!       url: http://remote:8080/woopsa
//! logging:
//!   level: info
//!   format: text
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use woopsa_core::error::{ConfigError, ConfigResult};
use woopsa_core::path::normalize_path;
use woopsa_core::protocol::DEFAULT_BASE_PATH;
use woopsa_core::types::{Value, ValueType};
use woopsa_subscription::{IdRange, SubscriptionSettings};

/// Default API port.
pub const DEFAULT_API_PORT: u16 = 8080;

// =============================================================================
// WoopsaConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WoopsaConfig {
    /// Server identity.
    #[serde(default)]
    pub server: ServerConfig,

    /// HTTP API.
    #[serde(default)]
    pub api: ApiConfig,

    /// Subscription engine.
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Clients used for mounted upstream servers.
    #[serde(default)]
    pub client: ClientConfig,

    /// Initial object model.
    #[serde(default)]
    pub model: ModelConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WoopsaConfig {
    /// Validates every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.api.validate()?;
        self.subscription.validate()?;
        self.client.validate()?;
        self.model.validate()?;
        Ok(())
    }

    /// Engine settings for the subscription service.
    pub fn subscription_settings(&self) -> SubscriptionSettings {
        self.subscription.to_settings()
    }
}

// =============================================================================
// ServerConfig
// =============================================================================

/// Server identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name matched against the server part of `server#path` links.
    #[serde(default = "default_server_name")]
    pub name: String,
}

fn default_server_name() -> String {
    "woopsa".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

impl ServerConfig {
    /// Validates the server section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() {
            return Err(ConfigError::validation("server.name", "cannot be empty"));
        }
        if self.name.contains('#') {
            return Err(ConfigError::validation("server.name", "cannot contain '#'"));
        }
        Ok(())
    }
}

// =============================================================================
// ApiConfig
// =============================================================================

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port.
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Prefix of the Woopsa routes.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            base_path: default_base_path(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Validates the API section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.request_timeout == 0 {
            return Err(ConfigError::validation("api.request_timeout", "cannot be zero"));
        }
        if !self.base_path.starts_with('/') {
            return Err(ConfigError::validation("api.base_path", "must start with '/'"));
        }
        Ok(())
    }

    /// Address to listen on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

// =============================================================================
// SubscriptionConfig
// =============================================================================

/// Subscription engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    /// Idle seconds before a channel is reaped.
    #[serde(default = "default_channel_lifetime")]
    pub channel_lifetime_secs: u64,

    /// How long a wait blocks on an empty queue.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_ms: u64,

    /// Most notifications returned by one wait.
    #[serde(default = "default_max_notifications")]
    pub max_notifications_per_wait: usize,

    /// Lowest subscription/notification id.
    #[serde(default = "default_id_min")]
    pub notification_id_min: u64,

    /// Highest subscription/notification id.
    #[serde(default = "default_id_max")]
    pub notification_id_max: u64,

    /// Period of the idle-channel sweep.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Most subscription ticks running at once.
    #[serde(default = "default_scheduler_workers")]
    pub scheduler_workers: usize,
}

fn default_channel_lifetime() -> u64 {
    60
}

fn default_wait_timeout() -> u64 {
    5_000
}

fn default_max_notifications() -> usize {
    1_000
}

fn default_id_min() -> u64 {
    IdRange::DEFAULT.min()
}

fn default_id_max() -> u64 {
    IdRange::DEFAULT.max()
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_scheduler_workers() -> usize {
    64
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            channel_lifetime_secs: default_channel_lifetime(),
            wait_timeout_ms: default_wait_timeout(),
            max_notifications_per_wait: default_max_notifications(),
            notification_id_min: default_id_min(),
            notification_id_max: default_id_max(),
            sweep_interval_secs: default_sweep_interval(),
            scheduler_workers: default_scheduler_workers(),
        }
    }
}

impl SubscriptionConfig {
    /// Validates the subscription section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.notification_id_min < 1 {
            return Err(ConfigError::validation(
                "subscription.notification_id_min",
                "must be at least 1; 0 is reserved",
            ));
        }
        if self.notification_id_min >= self.notification_id_max {
            return Err(ConfigError::validation(
                "subscription.notification_id_max",
                "must be greater than notification_id_min",
            ));
        }
        if self.wait_timeout_ms == 0 {
            return Err(ConfigError::validation("subscription.wait_timeout_ms", "cannot be zero"));
        }
        if self.channel_lifetime_secs.saturating_mul(1_000) <= self.wait_timeout_ms {
            return Err(ConfigError::validation(
                "subscription.channel_lifetime_secs",
                "must be longer than the wait timeout",
            ));
        }
        if self.max_notifications_per_wait == 0 {
            return Err(ConfigError::validation(
                "subscription.max_notifications_per_wait",
                "cannot be zero",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::validation("subscription.sweep_interval_secs", "cannot be zero"));
        }
        if self.scheduler_workers == 0 {
            return Err(ConfigError::validation("subscription.scheduler_workers", "cannot be zero"));
        }
        Ok(())
    }

    /// Converts to engine settings.
    pub fn to_settings(&self) -> SubscriptionSettings {
        let id_range = IdRange::new(self.notification_id_min, self.notification_id_max)
            .unwrap_or(IdRange::DEFAULT);
        SubscriptionSettings::default()
            .with_id_range(id_range)
            .with_wait_timeout(Duration::from_millis(self.wait_timeout_ms))
            .with_max_notifications_per_wait(self.max_notifications_per_wait)
            .with_channel_lifetime(Duration::from_secs(self.channel_lifetime_secs))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
            .with_scheduler_workers(self.scheduler_workers)
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// Settings for clients of upstream servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Delay before re-polling after a transport failure.
    #[serde(default = "default_retry_period")]
    pub retry_period_ms: u64,

    /// Queue size requested for upstream channels.
    #[serde(default = "default_queue_size")]
    pub default_queue_size: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_retry_period() -> u64 {
    1_000
}

fn default_queue_size() -> usize {
    1_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_period_ms: default_retry_period(),
            default_queue_size: default_queue_size(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    /// Validates the client section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_queue_size == 0 {
            return Err(ConfigError::validation("client.default_queue_size", "cannot be zero"));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::validation("client.request_timeout", "cannot be zero"));
        }
        Ok(())
    }

    /// Retry period as a duration.
    pub fn retry_period(&self) -> Duration {
        Duration::from_millis(self.retry_period_ms)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

// =============================================================================
// ModelConfig
// =============================================================================

/// Initial content of the in-memory object model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Properties created at startup.
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,

    /// Remote servers mounted into the tree.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

impl ModelConfig {
    /// Validates every property and upstream.
    pub fn validate(&self) -> ConfigResult<()> {
        for (i, property) in self.properties.iter().enumerate() {
            property.validate(i)?;
        }
        for (i, upstream) in self.upstreams.iter().enumerate() {
            upstream.validate(i)?;
        }
        Ok(())
    }
}

/// A property created at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyConfig {
    /// Property path.
    pub path: String,

    /// Initial value.
    #[serde(default)]
    pub value: serde_json::Value,

    /// Explicit Woopsa type; inferred from the value when absent.
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,

    /// Whether clients may write it.
    #[serde(default = "default_writable")]
    pub writable: bool,
}

fn default_writable() -> bool {
    true
}

impl PropertyConfig {
    fn validate(&self, index: usize) -> ConfigResult<()> {
        if normalize_path(&self.path).is_empty() {
            return Err(ConfigError::validation(
                format!("model.properties[{}].path", index),
                "cannot be empty",
            ));
        }
        self.initial_value().map(|_| ()).map_err(|e| match e {
            ConfigError::Validation { message, .. } => {
                ConfigError::validation(format!("model.properties[{}]", index), message)
            }
            other => other,
        })
    }

    /// Initial value converted to the property's type.
    pub fn initial_value(&self) -> ConfigResult<Value> {
        match &self.value_type {
            None => Ok(Value::infer(&self.value)),
            Some(name) => {
                let value_type = ValueType::parse(name).ok_or_else(|| {
                    ConfigError::validation("type", format!("unknown value type '{}'", name))
                })?;
                Value::from_json(&self.value, value_type)
                    .map_err(|e| ConfigError::validation("value", e.to_string()))
            }
        }
    }
}

/// A remote Woopsa server mounted at a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Mount point in the local tree.
    pub path: String,

    /// Server root, such as `http://remote:8080/woopsa`.
    pub url: String,
}

impl UpstreamConfig {
    fn validate(&self, index: usize) -> ConfigResult<()> {
        if normalize_path(&self.path).is_empty() {
            return Err(ConfigError::validation(
                format!("model.upstreams[{}].path", index),
                "cannot be empty",
            ));
        }
        if !self.url.starts_with("http") {
            return Err(ConfigError::validation(
                format!("model.upstreams[{}].url", index),
                "must be an http(s) URL",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// LoggingConfig
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Lowercase name, as accepted by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// Single-line compact output.
    Compact,
    /// JSON lines.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WoopsaConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.base_path, "/woopsa");
        assert_eq!(config.server.name, "woopsa");
    }

    #[test]
    fn test_subscription_settings_conversion() {
        let config = SubscriptionConfig {
            channel_lifetime_secs: 30,
            wait_timeout_ms: 2_000,
            notification_id_max: 100,
            ..SubscriptionConfig::default()
        };
        let settings = config.to_settings();
        assert_eq!(settings.channel_lifetime, Duration::from_secs(30));
        assert_eq!(settings.wait_timeout, Duration::from_secs(2));
        assert_eq!(settings.id_range.max(), 100);
    }

    #[test]
    fn test_rejects_reserved_id_min() {
        let config = SubscriptionConfig {
            notification_id_min: 0,
            ..SubscriptionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "subscription.notification_id_min"
        ));
    }

    #[test]
    fn test_lifetime_must_exceed_wait_timeout() {
        let config = SubscriptionConfig {
            channel_lifetime_secs: 5,
            wait_timeout_ms: 5_000,
            ..SubscriptionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_property_initial_value() {
        let typed = PropertyConfig {
            path: "Line1/Speed".into(),
            value: serde_json::json!(3),
            value_type: Some("Real".into()),
            writable: true,
        };
        assert_eq!(typed.initial_value().unwrap(), Value::Real(3.0));

        let inferred = PropertyConfig {
            value_type: None,
            value: serde_json::json!("on"),
            ..typed.clone()
        };
        assert_eq!(inferred.initial_value().unwrap(), Value::Text("on".into()));

        let unknown = PropertyConfig {
            value_type: Some("Quaternion".into()),
            ..typed
        };
        assert!(unknown.validate(0).is_err());
    }

    #[test]
    fn test_upstream_url_validation() {
        let upstream = UpstreamConfig {
            path: "Remote".into(),
            url: "ftp://remote".into(),
        };
        assert!(upstream.validate(0).is_err());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
