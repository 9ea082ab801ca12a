// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transports carrying the subscription operations to a server.

mod http;
mod local;

pub use http::HttpTransport;
pub use local::LocalTransport;

use std::time::Duration;

use async_trait::async_trait;

use woopsa_core::types::{
    ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue, Value,
};

use crate::error::ClientResult;

/// The operations a client needs from a Woopsa server.
#[async_trait]
pub trait SubscriptionTransport: Send + Sync {
    /// Opens a channel.
    async fn create_subscription_channel(&self, queue_size: usize) -> ClientResult<ChannelId>;

    /// Registers a subscription on a channel.
    async fn register_subscription(
        &self,
        channel_id: ChannelId,
        property_link: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
    ) -> ClientResult<SubscriptionId>;

    /// Unregisters a subscription.
    async fn unregister_subscription(
        &self,
        channel_id: ChannelId,
        subscription_id: SubscriptionId,
    ) -> ClientResult<bool>;

    /// Long-polls a channel.
    async fn wait_notification(
        &self,
        channel_id: ChannelId,
        last_notification_id: NotificationId,
    ) -> ClientResult<Vec<Notification>>;

    /// Reads a property.
    async fn read(&self, path: &str) -> ClientResult<TimedValue>;

    /// Writes a property.
    async fn write(&self, path: &str, value: Value) -> ClientResult<()>;
}
