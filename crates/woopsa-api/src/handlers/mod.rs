// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API handlers.
//!
//! - [`subscription`]: the four subscription service methods
//! - [`model`]: property read and write
//! - [`health`]: liveness
//! - [`metrics`]: Prometheus export

pub mod health;
pub mod metrics;
pub mod model;
pub mod subscription;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use model::{read_property, write_property};
pub use subscription::{
    create_subscription_channel, register_subscription, unregister_subscription, wait_notification,
};
