// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server runtime orchestration.
//!
//! Startup order:
//!
//! 1. build the in-memory model from `model.properties`
//! 2. mount a [`WoopsaClient`] for each `model.upstreams` entry
//! 3. start the subscription service and its sweeper
//! 4. serve the HTTP API until shutdown
//!
//! Shutdown runs the other way round: stop accepting requests, dispose every
//! channel, then stop the upstream clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use woopsa_api::{ApiConfig, ApiServer, AppState};
use woopsa_client::{ClientChannelSettings, FixedDelay, HttpTransport, WoopsaClient};
use woopsa_config::WoopsaConfig;
use woopsa_core::memory::MemoryModel;
use woopsa_core::model::ObjectModel;
use woopsa_subscription::{SubscriptionRoot, SubscriptionService};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// ServerRuntime
// =============================================================================

/// A configured server ready to run.
pub struct ServerRuntime {
    config: WoopsaConfig,
    model: Arc<MemoryModel>,
    upstreams: Vec<Arc<WoopsaClient>>,
    shutdown: ShutdownCoordinator,
}

impl ServerRuntime {
    /// Creates a builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// The loaded configuration.
    pub fn config(&self) -> &WoopsaConfig {
        &self.config
    }

    /// The served object model.
    pub fn model(&self) -> &Arc<MemoryModel> {
        &self.model
    }

    /// Number of mounted upstream servers.
    pub fn upstream_count(&self) -> usize {
        self.upstreams.len()
    }

    /// The coordinator that stops [`run`](Self::run).
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Serves until SIGTERM, SIGINT or a manual shutdown request.
    pub async fn run(self) -> BinResult<()> {
        let settings = self.config.subscription_settings();
        let service = SubscriptionService::builder(SubscriptionRoot::Server(
            self.model.clone() as Arc<dyn ObjectModel>,
        ))
        .settings(settings.clone())
        .build();
        service.start_sweeper();

        info!(
            channel_lifetime = %humantime::format_duration(settings.channel_lifetime),
            wait_timeout = %humantime::format_duration(settings.wait_timeout),
            sweep_interval = %humantime::format_duration(settings.sweep_interval),
            "Subscription service started"
        );

        let api_config = ApiConfig::new()
            .with_host(self.config.api.bind_address)
            .with_port(self.config.api.port)
            .with_base_path(self.config.api.base_path.clone())
            .with_request_timeout(self.config.api.request_timeout());
        let state = AppState::builder(service.clone(), self.model.clone() as Arc<dyn ObjectModel>)
            .config(api_config)
            .build()
            .map_err(|e| BinError::from(e).with_context("building the API state"))?;

        let signals = tokio::spawn({
            let shutdown = self.shutdown.clone();
            async move { shutdown.wait_for_shutdown().await }
        });

        let result = ApiServer::new(state)
            .run_with_shutdown(self.shutdown.signal())
            .await;

        // The server can also stop on its own, e.g. a bind failure.
        self.shutdown.initiate_shutdown();
        signals.abort();

        info!(channels = service.channel_count(), "Disposing subscription channels");
        service.shutdown().await;
        for client in &self.upstreams {
            client.close();
        }

        match result {
            Ok(()) => {
                info!("Woopsa server stopped");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Woopsa server stopped with an error");
                Err(BinError::from(e).with_context("serving the API"))
            }
        }
    }
}

impl std::fmt::Debug for ServerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRuntime")
            .field("server", &self.config.server.name)
            .field("properties", &self.config.model.properties.len())
            .field("upstreams", &self.upstreams.len())
            .finish()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`ServerRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<WoopsaConfig>,
}

impl RuntimeBuilder {
    /// Loads the configuration from a file.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Uses an already loaded configuration; wins over `config_path`.
    pub fn config(mut self, config: WoopsaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the model and the upstream clients.
    pub fn build(self) -> BinResult<ServerRuntime> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => {
                config.validate()?;
                config
            }
            (None, Some(path)) => woopsa_config::load_config(&path)?,
            (None, None) => return Err(BinError::config("no configuration given")),
        };

        let model = Arc::new(MemoryModel::new(config.server.name.clone()));
        for property in &config.model.properties {
            let value = property.initial_value()?;
            model.define(&property.path, value, property.writable);
        }

        let mut upstreams = Vec::with_capacity(config.model.upstreams.len());
        for upstream in &config.model.upstreams {
            let transport = HttpTransport::with_timeout(&upstream.url, config.client.request_timeout())
                .map_err(|e| BinError::from(e).with_context(format!("upstream '{}'", upstream.path)))?;
            let settings = ClientChannelSettings::default()
                .with_queue_size(config.client.default_queue_size)
                .with_retry(Arc::new(FixedDelay::new(config.client.retry_period())));
            let client = Arc::new(WoopsaClient::with_transport(Arc::new(transport), settings));

            model.mount_client(&upstream.path, client.clone());
            info!(path = %upstream.path, url = %upstream.url, "Upstream server mounted");
            upstreams.push(client);
        }

        info!(
            server = %config.server.name,
            properties = config.model.properties.len(),
            upstreams = upstreams.len(),
            "Object model built"
        );

        Ok(ServerRuntime {
            config,
            model,
            upstreams,
            shutdown: ShutdownCoordinator::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use woopsa_config::{ConfigFormat, ConfigLoader};
    use woopsa_core::types::Value;

    const CONFIG: &str = r#"
server:
  name: plant
api:
  bind_address: 127.0.0.1
  port: 0
model:
  properties:
    - path: Line1/Speed
      value: 12.5
    - path: Line1/Running
      value: true
      writable: false
    - path: Votes
      value: 3
      type: Integer
  upstreams:
    - path: Remote
      url: http://127.0.0.1:9/woopsa
"#;

    fn config() -> WoopsaConfig {
        ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(CONFIG, ConfigFormat::Yaml)
            .unwrap()
    }

    #[test]
    fn test_build_populates_model() {
        let runtime = ServerRuntime::builder().config(config()).build().unwrap();

        assert_eq!(runtime.model().get("Line1/Speed"), Some(Value::Real(12.5)));
        assert_eq!(runtime.model().get("Votes"), Some(Value::Integer(3)));
        assert!(runtime.model().contains("Remote"));
        assert_eq!(runtime.upstream_count(), 1);
    }

    #[test]
    fn test_build_without_config_fails() {
        let err = ServerRuntime::builder().build().unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = config();
        config.server.name = "a#b".to_string();
        assert!(ServerRuntime::builder().config(config).build().is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = config();
        config.model.upstreams.clear();
        let runtime = ServerRuntime::builder().config(config).build().unwrap();
        let shutdown = runtime.shutdown_coordinator();

        let handle = tokio::spawn(runtime.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.initiate_shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runtime should stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
