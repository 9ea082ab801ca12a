// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client-side subscription channel.
//!
//! Mirrors one server channel: remembers every subscription the caller made
//! (path and intervals), the server ids they currently map to, and the last
//! notification id received. A background task long-polls the server and
//! hands each value to its subscription's callback.
//!
//! # Recovery
//!
//! | Poll result | Action |
//! |---|---|
//! | invalid channel | create a new channel, re-register every subscription, poll from id 0 |
//! | notifications lost | poll again at once with id 0 |
//! | transport failure | sleep per the retry policy, poll again with the same id |
//!
//! Callbacks never see any of this; at most an interval of updates is
//! missing.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use woopsa_core::model::ValueCallback;
use woopsa_core::types::{ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId};

use crate::error::{ClientError, ClientResult};
use crate::retry::{FixedDelay, RetryPolicy};
use crate::transport::SubscriptionTransport;

// =============================================================================
// Identifiers and settings
// =============================================================================

/// Identifies a subscription on a client channel.
///
/// Stable across reconnections, unlike the server-side id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClientSubscriptionId(pub u64);

impl fmt::Display for ClientSubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client channel tuning.
#[derive(Debug, Clone)]
pub struct ClientChannelSettings {
    /// Queue size requested for server channels.
    pub queue_size: usize,
    /// Backoff after transport failures.
    pub retry: Arc<dyn RetryPolicy>,
}

impl Default for ClientChannelSettings {
    fn default() -> Self {
        Self {
            queue_size: 1_000,
            retry: Arc::new(FixedDelay::default()),
        }
    }
}

impl ClientChannelSettings {
    /// Sets the queue size.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }
}

/// Snapshot of client channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientChannelStats {
    /// Server channels created, including the first.
    pub channels_created: u64,
    /// Recoveries from an invalid channel.
    pub reconnects: u64,
    /// Lost-notification acknowledgements.
    pub losses: u64,
    /// Failed polls retried after a delay.
    pub transport_errors: u64,
    /// Values handed to callbacks.
    pub delivered: u64,
}

#[derive(Debug, Default)]
struct StatsInner {
    channels_created: AtomicU64,
    reconnects: AtomicU64,
    losses: AtomicU64,
    transport_errors: AtomicU64,
    delivered: AtomicU64,
}

impl StatsInner {
    fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

// =============================================================================
// State
// =============================================================================

struct Entry {
    path: String,
    monitor_interval: MonitorInterval,
    publish_interval: Duration,
    callback: ValueCallback,
    server_id: Option<SubscriptionId>,
}

#[derive(Default)]
struct Session {
    channel_id: Option<ChannelId>,
    last_id: NotificationId,
    by_server_id: HashMap<SubscriptionId, ClientSubscriptionId>,
}

struct Inner {
    transport: Arc<dyn SubscriptionTransport>,
    settings: ClientChannelSettings,
    // lock order: session, then entries
    session: tokio::sync::Mutex<Session>,
    entries: Mutex<HashMap<ClientSubscriptionId, Entry>>,
    next_id: AtomicU64,
    wake: Notify,
    stats: StatsInner,
}

impl Inner {
    /// Opens a fresh server channel and registers every known subscription on it.
    async fn establish(&self, session: &mut Session) -> ClientResult<ChannelId> {
        session.channel_id = None;
        session.last_id = NotificationId::RESET;
        session.by_server_id.clear();

        let channel_id = self
            .transport
            .create_subscription_channel(self.settings.queue_size)
            .await?;
        StatsInner::bump(&self.stats.channels_created, 1);

        let pending: Vec<_> = self
            .entries
            .lock()
            .iter_mut()
            .map(|(id, entry)| {
                entry.server_id = None;
                (*id, entry.path.clone(), entry.monitor_interval, entry.publish_interval)
            })
            .collect();

        for (id, path, monitor_interval, publish_interval) in pending {
            match self
                .transport
                .register_subscription(channel_id, &path, monitor_interval, publish_interval)
                .await
            {
                Ok(server_id) => {
                    session.by_server_id.insert(server_id, id);
                    if let Some(entry) = self.entries.lock().get_mut(&id) {
                        entry.server_id = Some(server_id);
                    }
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(path = %path, error = %e, "Subscription could not be re-registered");
                }
            }
        }

        session.channel_id = Some(channel_id);
        info!(
            channel_id = %channel_id,
            subscriptions = session.by_server_id.len(),
            "Subscription channel established"
        );
        Ok(channel_id)
    }

    async fn run(self: Arc<Self>) {
        let mut failures = 0u32;

        loop {
            let (channel, last_id) = {
                let session = self.session.lock().await;
                (session.channel_id, session.last_id)
            };

            let Some(channel_id) = channel else {
                if self.entries.lock().is_empty() {
                    let _ = tokio::time::timeout(self.settings.retry.delay(1), self.wake.notified()).await;
                    continue;
                }
                let result = {
                    let mut session = self.session.lock().await;
                    match session.channel_id {
                        Some(id) => Ok(id),
                        None => self.establish(&mut session).await,
                    }
                };
                if let Err(e) = result {
                    failures = failures.saturating_add(1);
                    self.back_off(failures, &e).await;
                }
                continue;
            };

            match self.transport.wait_notification(channel_id, last_id).await {
                Ok(notifications) => {
                    failures = 0;
                    self.dispatch(channel_id, notifications).await;
                }
                Err(ClientError::InvalidChannel { .. }) => {
                    info!(channel_id = %channel_id, "Subscription channel lost; re-establishing");
                    let result = {
                        let mut session = self.session.lock().await;
                        if session.channel_id == Some(channel_id) {
                            self.establish(&mut session).await.map(|_| true)
                        } else {
                            Ok(false)
                        }
                    };
                    match result {
                        Ok(true) => {
                            failures = 0;
                            StatsInner::bump(&self.stats.reconnects, 1);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            self.back_off(failures, &e).await;
                        }
                    }
                }
                Err(ClientError::NotificationsLost { .. }) => {
                    warn!(channel_id = %channel_id, "Notifications lost; acknowledging");
                    StatsInner::bump(&self.stats.losses, 1);
                    let mut session = self.session.lock().await;
                    if session.channel_id == Some(channel_id) {
                        session.last_id = NotificationId::RESET;
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    StatsInner::bump(&self.stats.transport_errors, 1);
                    self.back_off(failures, &e).await;
                }
            }
        }
    }

    async fn back_off(&self, attempt: u32, error: &ClientError) {
        let delay = self.settings.retry.delay(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            policy = self.settings.retry.name(),
            "Subscription poll failed; retrying"
        );
        tokio::time::sleep(delay).await;
    }

    async fn dispatch(&self, channel_id: ChannelId, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }

        let deliveries: Vec<_> = {
            let mut session = self.session.lock().await;
            if session.channel_id != Some(channel_id) {
                return;
            }
            let entries = self.entries.lock();
            let mut deliveries = Vec::with_capacity(notifications.len());
            for notification in notifications {
                session.last_id = notification.id;
                let local = session.by_server_id.get(&notification.subscription_id);
                if let Some(entry) = local.and_then(|id| entries.get(id)) {
                    deliveries.push((entry.callback.clone(), notification.value));
                }
            }
            deliveries
        };

        debug!(channel_id = %channel_id, count = deliveries.len(), "Dispatching notifications");
        StatsInner::bump(&self.stats.delivered, deliveries.len() as u64);
        for (callback, value) in deliveries {
            callback(value);
        }
    }
}

// =============================================================================
// ClientSubscriptionChannel
// =============================================================================

/// A self-healing subscription channel on a remote server.
pub struct ClientSubscriptionChannel {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientSubscriptionChannel {
    /// Creates a channel. Nothing is sent until the first subscription.
    pub fn new(transport: Arc<dyn SubscriptionTransport>, settings: ClientChannelSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                settings,
                session: tokio::sync::Mutex::new(Session::default()),
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                wake: Notify::new(),
                stats: StatsInner::default(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Subscribes to `path`, registering on the server right away.
    pub async fn subscribe(
        &self,
        path: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
        callback: ValueCallback,
    ) -> ClientResult<ClientSubscriptionId> {
        let inner = &self.inner;
        let mut session = inner.session.lock().await;

        let channel_id = match session.channel_id {
            Some(id) => id,
            None => inner.establish(&mut session).await?,
        };

        let registered = inner
            .transport
            .register_subscription(channel_id, path, monitor_interval, publish_interval)
            .await;
        let server_id = match registered {
            Ok(server_id) => server_id,
            Err(ClientError::InvalidChannel { .. }) => {
                let channel_id = inner.establish(&mut session).await?;
                StatsInner::bump(&inner.stats.reconnects, 1);
                inner
                    .transport
                    .register_subscription(channel_id, path, monitor_interval, publish_interval)
                    .await?
            }
            Err(e) => return Err(e),
        };

        let id = ClientSubscriptionId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        inner.entries.lock().insert(
            id,
            Entry {
                path: path.to_string(),
                monitor_interval,
                publish_interval,
                callback,
                server_id: Some(server_id),
            },
        );
        session.by_server_id.insert(server_id, id);
        drop(session);

        inner.wake.notify_one();
        debug!(subscription_id = %id, server_id = %server_id, path = %path, "Subscribed");
        Ok(id)
    }

    /// Unsubscribes. Returns `false` if the id is unknown.
    pub async fn unsubscribe(&self, id: ClientSubscriptionId) -> ClientResult<bool> {
        let inner = &self.inner;
        let mut session = inner.session.lock().await;

        let Some(entry) = inner.entries.lock().remove(&id) else {
            return Ok(false);
        };

        if let (Some(server_id), Some(channel_id)) = (entry.server_id, session.channel_id) {
            session.by_server_id.remove(&server_id);
            match inner
                .transport
                .unregister_subscription(channel_id, server_id)
                .await
            {
                Ok(_) | Err(ClientError::InvalidChannel { .. }) => {}
                Err(e) => warn!(subscription_id = %id, error = %e, "Server-side unsubscribe failed"),
            }
        }
        debug!(subscription_id = %id, path = %entry.path, "Unsubscribed");
        Ok(true)
    }

    /// Starts the long-poll task. Idempotent.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *task = Some(tokio::spawn(self.inner.clone().run()));
        debug!("Client subscription channel started");
    }

    /// Stops the long-poll task. Subscriptions are kept and resume on `start`.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            debug!("Client subscription channel stopped");
        }
    }

    /// Returns `true` while the long-poll task runs.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current server channel, if established.
    pub async fn channel_id(&self) -> Option<ChannelId> {
        self.inner.session.lock().await.channel_id
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> ClientChannelStats {
        let s = &self.inner.stats;
        ClientChannelStats {
            channels_created: s.channels_created.load(Ordering::Relaxed),
            reconnects: s.reconnects.load(Ordering::Relaxed),
            losses: s.losses.load(Ordering::Relaxed),
            transport_errors: s.transport_errors.load(Ordering::Relaxed),
            delivered: s.delivered.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ClientSubscriptionChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for ClientSubscriptionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSubscriptionChannel")
            .field("subscriptions", &self.subscription_count())
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use woopsa_core::types::{TimedValue, Value};

    /// Replays scripted poll results and records calls.
    #[derive(Default)]
    struct ScriptedTransport {
        polls: Mutex<VecDeque<ClientResult<Vec<Notification>>>>,
        calls: Mutex<Vec<String>>,
        next_channel: AtomicU64,
    }

    impl ScriptedTransport {
        fn record(&self, call: String) {
            self.calls.lock().push(call);
        }
    }

    #[async_trait]
    impl SubscriptionTransport for ScriptedTransport {
        async fn create_subscription_channel(&self, _queue_size: usize) -> ClientResult<ChannelId> {
            let id = self.next_channel.fetch_add(1, Ordering::SeqCst) + 1;
            self.record(format!("create:{}", id));
            Ok(ChannelId::new(id))
        }

        async fn register_subscription(
            &self,
            channel_id: ChannelId,
            property_link: &str,
            _monitor: MonitorInterval,
            _publish: Duration,
        ) -> ClientResult<SubscriptionId> {
            self.record(format!("register:{}:{}", channel_id, property_link));
            Ok(SubscriptionId::new(channel_id.get() * 100))
        }

        async fn unregister_subscription(
            &self,
            channel_id: ChannelId,
            subscription_id: SubscriptionId,
        ) -> ClientResult<bool> {
            self.record(format!("unregister:{}:{}", channel_id, subscription_id));
            Ok(true)
        }

        async fn wait_notification(
            &self,
            channel_id: ChannelId,
            last: NotificationId,
        ) -> ClientResult<Vec<Notification>> {
            self.record(format!("wait:{}:{}", channel_id, last));
            let next = self.polls.lock().pop_front();
            match next {
                Some(result) => result,
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn read(&self, _path: &str) -> ClientResult<TimedValue> {
            Ok(TimedValue::null())
        }

        async fn write(&self, _path: &str, _value: Value) -> ClientResult<()> {
            Ok(())
        }
    }

    fn notification(id: u64, subscription: u64, value: i64) -> Notification {
        Notification {
            id: NotificationId::new(id),
            subscription_id: SubscriptionId::new(subscription),
            value: TimedValue::new(value),
        }
    }

    fn collecting() -> (ValueCallback, Arc<Mutex<Vec<Value>>>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = values.clone();
        let callback: ValueCallback = Arc::new(move |v: TimedValue| sink.lock().push(v.value));
        (callback, values)
    }

    fn settings() -> ClientChannelSettings {
        ClientChannelSettings::default().with_retry(Arc::new(FixedDelay::new(Duration::from_millis(100))))
    }

    const EVERY: MonitorInterval = MonitorInterval::Every(Duration::from_millis(10));

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_invalid_channel() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.polls.lock().extend([
            Ok(vec![notification(1, 100, 5)]),
            Err(ClientError::from_remote(woopsa_core::error::INVALID_CHANNEL_EXCEPTION, "gone")),
            Ok(vec![notification(1, 200, 6)]),
        ]);
        let channel = ClientSubscriptionChannel::new(transport.clone(), settings());
        let (callback, values) = collecting();

        channel
            .subscribe("Votes", EVERY, Duration::from_millis(20), callback)
            .await
            .unwrap();
        channel.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(*values.lock(), vec![Value::Integer(5), Value::Integer(6)]);
        assert_eq!(channel.channel_id().await, Some(ChannelId::new(2)));
        assert_eq!(channel.stats().reconnects, 1);

        let calls = transport.calls.lock().clone();
        assert_eq!(
            &calls[..6],
            &[
                "create:1".to_string(),
                "register:1:Votes".to_string(),
                "wait:1:0".to_string(),
                "wait:1:1".to_string(),
                "create:2".to_string(),
                "register:2:Votes".to_string(),
            ]
        );
        assert_eq!(calls[6], "wait:2:0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_notifications_repoll_with_reset() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.polls.lock().extend([
            Ok(vec![notification(4, 100, 1)]),
            Err(ClientError::from_remote(woopsa_core::error::NOTIFICATIONS_LOST_EXCEPTION, "lost")),
        ]);
        let channel = ClientSubscriptionChannel::new(transport.clone(), settings());
        let (callback, _values) = collecting();

        channel.subscribe("Votes", EVERY, Duration::from_millis(20), callback).await.unwrap();
        channel.start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let calls = transport.calls.lock().clone();
        assert_eq!(&calls[2..], &["wait:1:0", "wait:1:4", "wait:1:0"]);
        assert_eq!(channel.stats().losses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_keeps_last_id() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.polls.lock().extend([
            Ok(vec![notification(9, 100, 1)]),
            Err(ClientError::transport("connection refused")),
        ]);
        let channel = ClientSubscriptionChannel::new(transport.clone(), settings());
        let (callback, _values) = collecting();

        channel.subscribe("Votes", EVERY, Duration::from_millis(20), callback).await.unwrap();
        channel.start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.calls.lock().len(), 4);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = transport.calls.lock().clone();
        assert_eq!(&calls[2..], &["wait:1:0", "wait:1:9", "wait:1:9"]);
        assert_eq!(channel.stats().transport_errors, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::default());
        let channel = ClientSubscriptionChannel::new(transport.clone(), settings());
        let (callback, _values) = collecting();

        let id = channel.subscribe("Votes", EVERY, Duration::from_millis(20), callback).await.unwrap();
        assert!(channel.unsubscribe(id).await.unwrap());
        assert!(!channel.unsubscribe(id).await.unwrap());
        assert_eq!(channel.subscription_count(), 0);
        assert!(transport.calls.lock().contains(&"unregister:1:100".to_string()));
    }
}
