// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use woopsa_core::model::ObjectModel;
use woopsa_core::path::normalize_path;
use woopsa_core::types::{
    ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue, Value,
};
use woopsa_subscription::SubscriptionService;

use super::SubscriptionTransport;
use crate::error::ClientResult;

/// Calls a [`SubscriptionService`] and its model directly, without HTTP.
#[derive(Clone)]
pub struct LocalTransport {
    service: Arc<SubscriptionService>,
    model: Arc<dyn ObjectModel>,
}

impl LocalTransport {
    /// Creates a transport over a service and the model it serves.
    pub fn new(service: Arc<SubscriptionService>, model: Arc<dyn ObjectModel>) -> Self {
        Self { service, model }
    }

    /// The wrapped service.
    pub fn service(&self) -> &Arc<SubscriptionService> {
        &self.service
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("service", &self.service)
            .finish()
    }
}

#[async_trait]
impl SubscriptionTransport for LocalTransport {
    async fn create_subscription_channel(&self, queue_size: usize) -> ClientResult<ChannelId> {
        Ok(self.service.create_channel(queue_size))
    }

    async fn register_subscription(
        &self,
        channel_id: ChannelId,
        property_link: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
    ) -> ClientResult<SubscriptionId> {
        Ok(self
            .service
            .register_subscription(channel_id, property_link, monitor_interval, publish_interval)
            .await?)
    }

    async fn unregister_subscription(
        &self,
        channel_id: ChannelId,
        subscription_id: SubscriptionId,
    ) -> ClientResult<bool> {
        Ok(self
            .service
            .unregister_subscription(channel_id, subscription_id)
            .await?)
    }

    async fn wait_notification(
        &self,
        channel_id: ChannelId,
        last_notification_id: NotificationId,
    ) -> ClientResult<Vec<Notification>> {
        Ok(self
            .service
            .wait_notification(channel_id, last_notification_id)
            .await?)
    }

    async fn read(&self, path: &str) -> ClientResult<TimedValue> {
        Ok(self.model.read(&normalize_path(path)).await?)
    }

    async fn write(&self, path: &str, value: Value) -> ClientResult<()> {
        Ok(self.model.write(&normalize_path(path), value).await?)
    }
}
