// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # woopsa-config
//!
//! Configuration for the Woopsa server.
//!
//! - **Schema**: every section defaulted, so an empty file is valid
//! - **Formats**: YAML, TOML and JSON, chosen by file extension
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in any value
//! - **Overrides**: `WOOPSA_API_PORT`, `WOOPSA_LOG_LEVEL`,
//!   `WOOPSA_CHANNEL_LIFETIME_SECS`
//!
//! ## Quick Start
//!
//! ```no_run
//! use woopsa_config::load_config;
//!
//! let config = load_config("woopsa.yaml").unwrap();
//! let settings = config.subscription_settings();
//! println!("channels live {:?} without polls", settings.channel_lifetime);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod loader;
pub mod schema;

pub use woopsa_core::error::{ConfigError, ConfigResult};

pub use loader::{load_config, resolve_env_placeholders, ConfigFormat, ConfigLoader};
pub use schema::{
    ApiConfig, ClientConfig, LogFormat, LogLevel, LoggingConfig, ModelConfig, PropertyConfig,
    ServerConfig, SubscriptionConfig, UpstreamConfig, WoopsaConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
