// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! A remote Woopsa server.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use woopsa_core::error::ModelResult;
use woopsa_core::model::{UpstreamClient, UpstreamSubscriptionId, ValueCallback};
use woopsa_core::types::{MonitorInterval, TimedValue, Value};

use crate::channel::{ClientChannelSettings, ClientChannelStats, ClientSubscriptionChannel, ClientSubscriptionId};
use crate::error::ClientResult;
use crate::transport::{HttpTransport, SubscriptionTransport};

/// Reads, writes and subscribes on a remote server.
///
/// All subscriptions share one [`ClientSubscriptionChannel`], started on the
/// first `subscribe`.
pub struct WoopsaClient {
    transport: Arc<dyn SubscriptionTransport>,
    channel: ClientSubscriptionChannel,
}

impl WoopsaClient {
    /// Connects over HTTP to a server root such as `http://host:8080/woopsa`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Ok(Self::with_transport(
            Arc::new(HttpTransport::new(base_url)?),
            ClientChannelSettings::default(),
        ))
    }

    /// Uses the given transport.
    pub fn with_transport(transport: Arc<dyn SubscriptionTransport>, settings: ClientChannelSettings) -> Self {
        let channel = ClientSubscriptionChannel::new(transport.clone(), settings);
        Self { transport, channel }
    }

    /// Reads a property.
    pub async fn read(&self, path: &str) -> ClientResult<TimedValue> {
        self.transport.read(path).await
    }

    /// Writes a property.
    pub async fn write(&self, path: &str, value: Value) -> ClientResult<()> {
        self.transport.write(path, value).await
    }

    /// Subscribes to a property; `callback` runs on the poll task.
    pub async fn subscribe(
        &self,
        path: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
        callback: ValueCallback,
    ) -> ClientResult<ClientSubscriptionId> {
        let id = self
            .channel
            .subscribe(path, monitor_interval, publish_interval, callback)
            .await?;
        self.channel.start();
        Ok(id)
    }

    /// Cancels a subscription.
    pub async fn unsubscribe(&self, id: ClientSubscriptionId) -> ClientResult<bool> {
        self.channel.unsubscribe(id).await
    }

    /// The shared subscription channel.
    pub fn channel(&self) -> &ClientSubscriptionChannel {
        &self.channel
    }

    /// Channel counters.
    pub fn stats(&self) -> ClientChannelStats {
        self.channel.stats()
    }

    /// Stops polling.
    pub fn close(&self) {
        self.channel.stop();
        debug!("Woopsa client closed");
    }
}

impl fmt::Debug for WoopsaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WoopsaClient")
            .field("channel", &self.channel)
            .finish()
    }
}

#[async_trait]
impl UpstreamClient for WoopsaClient {
    async fn read(&self, path: &str) -> ModelResult<TimedValue> {
        WoopsaClient::read(self, path)
            .await
            .map_err(|e| e.into_model_error(path))
    }

    async fn write(&self, path: &str, value: Value) -> ModelResult<()> {
        WoopsaClient::write(self, path, value)
            .await
            .map_err(|e| e.into_model_error(path))
    }

    async fn subscribe(
        &self,
        path: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
        callback: ValueCallback,
    ) -> ModelResult<UpstreamSubscriptionId> {
        WoopsaClient::subscribe(self, path, monitor_interval, publish_interval, callback)
            .await
            .map(|id| UpstreamSubscriptionId(id.0))
            .map_err(|e| e.into_model_error(path))
    }

    async fn unsubscribe(&self, id: UpstreamSubscriptionId) -> ModelResult<bool> {
        WoopsaClient::unsubscribe(self, ClientSubscriptionId(id.0))
            .await
            .map_err(|e| e.into_model_error(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalTransport;
    use parking_lot::Mutex;
    use woopsa_core::memory::MemoryModel;
    use woopsa_core::model::ObjectModel;
    use woopsa_subscription::{SubscriptionService, SubscriptionSettings};

    fn local_client() -> (Arc<MemoryModel>, WoopsaClient) {
        let model = Arc::new(MemoryModel::new("plant"));
        model.set("Line1/Speed", 10i64);
        let service = SubscriptionService::new(
            model.clone() as Arc<dyn ObjectModel>,
            SubscriptionSettings::for_testing(),
        );
        let transport = LocalTransport::new(service, model.clone());
        let client = WoopsaClient::with_transport(Arc::new(transport), ClientChannelSettings::default());
        (model, client)
    }

    #[tokio::test]
    async fn test_read_and_write_through_transport() {
        let (model, client) = local_client();
        assert_eq!(client.read("Line1/Speed").await.unwrap().value, Value::Integer(10));

        client.write("/Line1/Speed", Value::Integer(12)).await.unwrap();
        assert_eq!(model.get("Line1/Speed"), Some(Value::Integer(12)));
    }

    #[tokio::test]
    async fn test_upstream_read_maps_not_found() {
        let (_model, client) = local_client();
        let upstream: &dyn UpstreamClient = &client;
        let error = upstream.read("Line1/Missing").await.unwrap_err();
        assert!(matches!(error, woopsa_core::error::ModelError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_changes() {
        let (model, client) = local_client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        client
            .subscribe(
                "Line1/Speed",
                MonitorInterval::Every(Duration::from_millis(10)),
                Duration::from_millis(20),
                Arc::new(move |v: TimedValue| sink.lock().push(v.value)),
            )
            .await
            .unwrap();
        assert!(client.channel().is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        model.set("Line1/Speed", 11i64);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let seen = seen.lock().clone();
        assert_eq!(seen.first(), Some(&Value::Integer(10)));
        assert_eq!(seen.last(), Some(&Value::Integer(11)));
        client.close();
    }
}
