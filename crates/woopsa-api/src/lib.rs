// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # woopsa-api
//!
//! HTTP front of the Woopsa subscription service.
//!
//! Routes under the configured base path (default `/woopsa`):
//!
//! | Route | Operation |
//! |---|---|
//! | `POST invoke/SubscriptionService/CreateSubscriptionChannel` | open a channel |
//! | `POST invoke/SubscriptionService/RegisterSubscription` | subscribe |
//! | `POST invoke/SubscriptionService/UnregisterSubscription` | unsubscribe |
//! | `POST invoke/SubscriptionService/WaitNotification` | long-poll |
//! | `GET read/{*path}` | read a property |
//! | `POST write/{*path}` | write a property |
//!
//! plus `GET /health` and `GET /metrics` (Prometheus text format) at the root.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod response;
pub mod server;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use metrics::ApiMetrics;
pub use server::ApiServer;
pub use state::{AppState, AppStateBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
