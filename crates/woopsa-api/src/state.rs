// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use woopsa_core::hooks::{ModelAccessHooks, NoOpModelAccessHooks};
use woopsa_core::model::ObjectModel;
use woopsa_subscription::SubscriptionService;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::metrics::ApiMetrics;

// =============================================================================
// AppState
// =============================================================================

/// State passed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// The subscription service.
    pub service: Arc<SubscriptionService>,
    /// The served object model.
    pub model: Arc<dyn ObjectModel>,
    /// Hooks around read/write requests.
    pub hooks: Arc<dyn ModelAccessHooks>,
    /// Exported metrics.
    pub metrics: Arc<ApiMetrics>,
    /// When the state was built.
    pub started_at: Instant,
}

impl AppState {
    /// Creates a state builder.
    pub fn builder(service: Arc<SubscriptionService>, model: Arc<dyn ObjectModel>) -> AppStateBuilder {
        AppStateBuilder::new(service, model)
    }

    /// Seconds since the state was built.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    service: Arc<SubscriptionService>,
    model: Arc<dyn ObjectModel>,
    config: Option<ApiConfig>,
    hooks: Option<Arc<dyn ModelAccessHooks>>,
    metrics: Option<Arc<ApiMetrics>>,
}

impl AppStateBuilder {
    /// Creates a builder around the service and its model.
    pub fn new(service: Arc<SubscriptionService>, model: Arc<dyn ObjectModel>) -> Self {
        Self {
            service,
            model,
            config: None,
            hooks: None,
            metrics: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the model access hooks.
    pub fn hooks(mut self, hooks: Arc<dyn ModelAccessHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Shares a metrics registry, e.g. between several servers.
    pub fn metrics(mut self, metrics: Arc<ApiMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the state. Fails only if a fresh metrics registry cannot be created.
    pub fn build(self) -> ApiResult<AppState> {
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(ApiMetrics::new()?),
        };
        Ok(AppState {
            config: Arc::new(self.config.unwrap_or_default()),
            service: self.service,
            model: self.model,
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoOpModelAccessHooks)),
            metrics,
            started_at: Instant::now(),
        })
    }
}
