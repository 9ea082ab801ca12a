// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # woopsa-subscription
//!
//! The Woopsa subscription engine.
//!
//! A client opens a [`SubscriptionChannel`] through the
//! [`SubscriptionService`], registers any number of property subscriptions
//! on it, and long-polls the channel for notifications. Each subscription
//! samples its property on a monitor interval and flushes detected changes
//! into the channel's bounded [`NotificationQueue`] on a publish interval.
//!
//! ## Delivery
//!
//! - Notification ids increase in enqueue order and wrap from the configured
//!   maximum back to the minimum. `0` is never assigned.
//! - A wait returns a snapshot of the queue without removing it; the next
//!   wait acknowledges everything up to the id it carries.
//! - If the queue overflowed, the next wait fails with `NotificationsLost`
//!   until the client acknowledges with id `0`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use woopsa_core::MemoryModel;
//! use woopsa_subscription::{SubscriptionService, SubscriptionSettings};
//!
//! let model = Arc::new(MemoryModel::new("server"));
//! model.set("Votes", 0);
//!
//! let service = SubscriptionService::new(model, SubscriptionSettings::default());
//! let channel = service.create_channel(10);
//! let id = service
//!     .register_subscription(channel, "Votes", MonitorInterval::Every(ms(10)), ms(20))
//!     .await?;
//! let notifications = service.wait_notification(channel, NotificationId::RESET).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Engine Modules
// =============================================================================

pub mod channel;
pub mod ids;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod subscription;

// =============================================================================
// Re-exports
// =============================================================================

pub use channel::SubscriptionChannel;
pub use ids::{ChannelIdGenerator, IdRange, WrappingIdSequence};
pub use queue::{NotificationQueue, QueueStats};
pub use scheduler::{Scheduler, SchedulerStats, TimerHandle};
pub use service::{ServiceStats, SubscriptionService, SubscriptionServiceBuilder};
pub use settings::SubscriptionSettings;
pub use subscription::{NotificationSink, Subscription, SubscriptionKind, SubscriptionRoot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
