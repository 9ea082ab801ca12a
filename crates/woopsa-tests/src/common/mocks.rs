// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! - [`MockUpstreamClient`]: a remote server held in memory, whose native
//!   subscriptions are fired by [`MockUpstreamClient::emit`]
//! - [`FlakyTransport`]: wraps a real transport and injects failures or a
//!   server swap
//! - [`ValueRecorder`]: collects callback values

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use woopsa_client::{ClientError, ClientResult, SubscriptionTransport};
use woopsa_core::error::{ModelError, ModelResult};
use woopsa_core::model::{UpstreamClient, UpstreamSubscriptionId, ValueCallback};
use woopsa_core::path::normalize_path;
use woopsa_core::types::{
    ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue, Value,
};

// =============================================================================
// Mock Upstream Client
// =============================================================================

/// A remote server kept in memory.
#[derive(Default)]
pub struct MockUpstreamClient {
    values: RwLock<HashMap<String, TimedValue>>,
    subscribers: Mutex<HashMap<u64, (String, ValueCallback)>>,
    next_id: AtomicU64,
    fail_reads: AtomicBool,
    read_count: AtomicU64,
    subscribe_count: AtomicU64,
    unsubscribe_count: AtomicU64,
}

impl MockUpstreamClient {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a remote property without notifying subscribers.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        self.values
            .write()
            .insert(normalize_path(path), TimedValue::now(value));
    }

    /// Sets a remote property and fires every native subscription on it.
    ///
    /// Returns how many callbacks ran.
    pub fn emit(&self, path: &str, value: impl Into<Value>) -> usize {
        let path = normalize_path(path);
        let value = TimedValue::now(value);
        self.values.write().insert(path.clone(), value.clone());

        let callbacks: Vec<ValueCallback> = self
            .subscribers
            .lock()
            .values()
            .filter(|(p, _)| *p == path)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in &callbacks {
            callback(value.clone());
        }
        callbacks.len()
    }

    /// Makes every read fail with an upstream error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of open native subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Number of reads served or refused.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Number of successful `subscribe` calls.
    pub fn subscribe_count(&self) -> u64 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of `unsubscribe` calls.
    pub fn unsubscribe_count(&self) -> u64 {
        self.unsubscribe_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    async fn read(&self, path: &str) -> ModelResult<TimedValue> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ModelError::upstream("injected read failure"));
        }
        self.values
            .read()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| ModelError::not_found(path))
    }

    async fn write(&self, path: &str, value: Value) -> ModelResult<()> {
        self.set(path, value);
        Ok(())
    }

    async fn subscribe(
        &self,
        path: &str,
        _monitor_interval: MonitorInterval,
        _publish_interval: Duration,
        callback: ValueCallback,
    ) -> ModelResult<UpstreamSubscriptionId> {
        let path = normalize_path(path);
        if !self.values.read().contains_key(&path) {
            return Err(ModelError::not_found(path));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.subscribers.lock().insert(id, (path, callback));
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        Ok(UpstreamSubscriptionId(id))
    }

    async fn unsubscribe(&self, id: UpstreamSubscriptionId) -> ModelResult<bool> {
        self.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.subscribers.lock().remove(&id.0).is_some())
    }
}

// =============================================================================
// Flaky Transport
// =============================================================================

/// A transport that can drop requests or be pointed at a new server.
pub struct FlakyTransport {
    inner: RwLock<Arc<dyn SubscriptionTransport>>,
    offline: AtomicBool,
    failing_waits: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl FlakyTransport {
    /// Wraps a working transport.
    pub fn new(inner: Arc<dyn SubscriptionTransport>) -> Self {
        Self {
            inner: RwLock::new(inner),
            offline: AtomicBool::new(false),
            failing_waits: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Routes every later call to `inner`, as if the server restarted.
    pub fn replace_inner(&self, inner: Arc<dyn SubscriptionTransport>) {
        *self.inner.write() = inner;
    }

    /// Fails every call with a transport error while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fails the next `count` waits with a transport error.
    pub fn fail_next_waits(&self, count: usize) {
        self.failing_waits.store(count, Ordering::SeqCst);
    }

    /// How many times `operation` was attempted.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == operation).count()
    }

    fn enter(&self, operation: &'static str) -> ClientResult<Arc<dyn SubscriptionTransport>> {
        self.calls.lock().push(operation);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::transport("server unreachable"));
        }
        Ok(self.inner.read().clone())
    }
}

#[async_trait]
impl SubscriptionTransport for FlakyTransport {
    async fn create_subscription_channel(&self, queue_size: usize) -> ClientResult<ChannelId> {
        self.enter("create")?.create_subscription_channel(queue_size).await
    }

    async fn register_subscription(
        &self,
        channel_id: ChannelId,
        property_link: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
    ) -> ClientResult<SubscriptionId> {
        self.enter("register")?
            .register_subscription(channel_id, property_link, monitor_interval, publish_interval)
            .await
    }

    async fn unregister_subscription(
        &self,
        channel_id: ChannelId,
        subscription_id: SubscriptionId,
    ) -> ClientResult<bool> {
        self.enter("unregister")?
            .unregister_subscription(channel_id, subscription_id)
            .await
    }

    async fn wait_notification(
        &self,
        channel_id: ChannelId,
        last_notification_id: NotificationId,
    ) -> ClientResult<Vec<Notification>> {
        let inner = self.enter("wait")?;
        let injected = self
            .failing_waits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            tokio::time::sleep(Duration::from_millis(5)).await;
            return Err(ClientError::transport("injected wait failure"));
        }
        inner.wait_notification(channel_id, last_notification_id).await
    }

    async fn read(&self, path: &str) -> ClientResult<TimedValue> {
        self.enter("read")?.read(path).await
    }

    async fn write(&self, path: &str, value: Value) -> ClientResult<()> {
        self.enter("write")?.write(path, value).await
    }
}

// =============================================================================
// Value Recorder
// =============================================================================

/// Collects the values delivered to a callback.
#[derive(Clone, Default)]
pub struct ValueRecorder {
    values: Arc<Mutex<Vec<TimedValue>>>,
}

impl ValueRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that records into this recorder.
    pub fn callback(&self) -> ValueCallback {
        let values = self.values.clone();
        Arc::new(move |value| values.lock().push(value))
    }

    /// Every recorded value, oldest first.
    pub fn values(&self) -> Vec<Value> {
        self.values.lock().iter().map(|v| v.value.clone()).collect()
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Waits until `value` was recorded. Returns `false` on timeout.
    pub async fn wait_for(&self, value: impl Into<Value>, timeout: Duration) -> bool {
        let value = value.into();
        crate::common::harness::eventually(timeout, || self.values().contains(&value)).await
    }
}
