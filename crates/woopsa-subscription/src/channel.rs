// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription channels.
//!
//! A channel multiplexes many subscriptions behind one long-poll endpoint.
//! It owns the notification queue, the subscription registry and the id
//! sequences, and tracks client activity for the idle sweep.
//!
//! # Locking
//!
//! Three locks, always taken in this order and never the reverse:
//!
//! ```text
//! registry  ->  ids  ->  queue (internal)
//! ```
//!
//! Publishing holds the registry lock while it stamps and enqueues, so a
//! notification can never be queued for a subscription that unregistration
//! has already purged, and ids are assigned in enqueue order.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use woopsa_core::error::{SubscriptionError, SubscriptionResult};
use woopsa_core::hooks::ModelAccessHooks;
use woopsa_core::types::{
    ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue,
};

use crate::ids::WrappingIdSequence;
use crate::queue::{NotificationQueue, QueueStats};
use crate::scheduler::Scheduler;
use crate::settings::SubscriptionSettings;
use crate::subscription::{resolve, NotificationSink, Subscription, SubscriptionRoot};

struct ChannelIds {
    subscriptions: WrappingIdSequence,
    notifications: WrappingIdSequence,
    last_removed: NotificationId,
}

// =============================================================================
// SubscriptionChannel
// =============================================================================

/// A client session: subscriptions, their pending notifications, and the
/// long-poll wait on them.
pub struct SubscriptionChannel {
    id: ChannelId,
    root: SubscriptionRoot,
    settings: SubscriptionSettings,
    queue: NotificationQueue,
    registry: Mutex<HashMap<SubscriptionId, Arc<Subscription>>>,
    ids: Mutex<ChannelIds>,
    notifications_lost: AtomicBool,
    stopped: AtomicBool,
    last_activity: Mutex<Instant>,
    notify: Notify,
    scheduler: Arc<Scheduler>,
    hooks: Arc<dyn ModelAccessHooks>,
    this: Weak<SubscriptionChannel>,
}

impl SubscriptionChannel {
    /// Creates a channel whose queue holds `queue_size` notifications.
    pub fn new(
        id: ChannelId,
        root: SubscriptionRoot,
        queue_size: usize,
        settings: SubscriptionSettings,
        scheduler: Arc<Scheduler>,
        hooks: Arc<dyn ModelAccessHooks>,
    ) -> Arc<Self> {
        let range = settings.id_range;
        Arc::new_cyclic(|this| Self {
            id,
            root,
            queue: NotificationQueue::new(queue_size, range),
            registry: Mutex::new(HashMap::new()),
            ids: Mutex::new(ChannelIds {
                subscriptions: WrappingIdSequence::new(range),
                notifications: WrappingIdSequence::new(range),
                // the predecessor of the first id, so age is measured inside the range
                last_removed: NotificationId::new(range.max()),
            }),
            notifications_lost: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            notify: Notify::new(),
            scheduler,
            hooks,
            settings,
            this: this.clone(),
        })
    }

    /// Channel id.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Queue capacity.
    pub fn queue_size(&self) -> usize {
        self.queue.max_size()
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns `true` if the queue evicted notifications not yet acknowledged with id 0.
    pub fn notifications_lost(&self) -> bool {
        self.notifications_lost.load(Ordering::Acquire)
    }

    /// Returns `true` once stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Queue counters.
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Returns `true` if no client call arrived within the channel lifetime.
    pub fn client_timed_out(&self) -> bool {
        self.last_activity.lock().elapsed() > self.settings.channel_lifetime
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Registers a subscription on `path` and starts monitoring it.
    pub async fn register_subscription(
        &self,
        path: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
    ) -> SubscriptionResult<SubscriptionId> {
        self.touch();
        if self.is_stopped() {
            return Err(SubscriptionError::ChannelStopped);
        }

        let resolved = resolve(&self.root, path, &self.hooks).await?;
        let kind = resolved.kind();
        let id = SubscriptionId::new(self.ids.lock().subscriptions.next_id());
        let sink: Weak<dyn NotificationSink> = self.this.clone();

        let subscription = Subscription::new(
            id,
            path,
            resolved,
            monitor_interval,
            publish_interval,
            sink,
            self.hooks.clone(),
        );
        // dispose() drains the registry after setting the stop flag, so a
        // subscription inserted under this lock is either drained or refused
        let inserted = {
            let mut registry = self.registry.lock();
            let open = !self.is_stopped();
            if open {
                registry.insert(id, subscription.clone());
            }
            open
        };
        if !inserted {
            subscription.dispose().await;
            return Err(SubscriptionError::ChannelStopped);
        }

        if let Err(e) = subscription.start(&self.scheduler).await {
            self.registry.lock().remove(&id);
            subscription.dispose().await;
            warn!(channel_id = %self.id, path = %path, error = %e, "Subscription failed to start");
            return Err(e);
        }

        debug!(
            channel_id = %self.id,
            subscription_id = %id,
            path = %subscription.path(),
            kind = %kind,
            "Subscription registered"
        );
        Ok(id)
    }

    /// Unregisters a subscription and purges its queued notifications.
    ///
    /// Returns `false` if the id is unknown.
    pub async fn unregister_subscription(&self, subscription_id: SubscriptionId) -> bool {
        self.touch();
        let removed = {
            let mut registry = self.registry.lock();
            let removed = registry.remove(&subscription_id);
            if removed.is_some() {
                self.queue.remove_for_subscription(subscription_id);
            }
            removed
        };

        match removed {
            Some(subscription) => {
                subscription.dispose().await;
                debug!(channel_id = %self.id, subscription_id = %subscription_id, "Subscription unregistered");
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Long poll
    // =========================================================================

    /// Waits for notifications newer than `last_notification_id`.
    ///
    /// - `0` acknowledges lost notifications and returns what is queued.
    /// - Any other id fails with `NotificationsLost` while the lost flag is
    ///   set; otherwise it acknowledges everything up to that id.
    ///
    /// Blocks while the queue is empty, until a notification arrives, the
    /// channel stops, or `timeout` elapses. Returns at most
    /// `max_notifications_per_wait` items, oldest first, without removing them.
    pub async fn wait_notification(
        &self,
        last_notification_id: NotificationId,
        timeout: Duration,
    ) -> SubscriptionResult<Vec<Notification>> {
        self.touch();
        if self.is_stopped() {
            return Err(SubscriptionError::ChannelStopped);
        }

        if last_notification_id.is_reset() {
            if self.notifications_lost.swap(false, Ordering::AcqRel) {
                info!(channel_id = %self.id, "Lost notifications acknowledged");
            }
        } else if self.notifications_lost() {
            return Err(SubscriptionError::notifications_lost(self.id));
        } else {
            let mut ids = self.ids.lock();
            ids.last_removed = self.queue.remove_older(ids.last_removed, last_notification_id);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.queue.is_empty() || self.is_stopped() {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }

        let notifications = self.queue.peek(self.settings.max_notifications_per_wait);
        self.touch();
        Ok(notifications)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Wakes every blocked wait. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!(channel_id = %self.id, "Channel stopped");
        }
        self.notify.notify_waiters();
    }

    /// Stops the channel and disposes every subscription.
    pub async fn dispose(&self) {
        self.stop();
        let subscriptions: Vec<_> = self.registry.lock().drain().map(|(_, s)| s).collect();
        let count = subscriptions.len();
        for subscription in subscriptions {
            subscription.dispose().await;
        }
        self.queue.clear();
        info!(channel_id = %self.id, subscriptions = count, "Channel disposed");
    }
}

impl NotificationSink for SubscriptionChannel {
    fn publish(
        &self,
        subscription_id: SubscriptionId,
        monitor_interval: MonitorInterval,
        values: Vec<TimedValue>,
    ) {
        if values.is_empty() {
            return;
        }

        {
            let registry = self.registry.lock();
            if self.is_stopped() || !registry.contains_key(&subscription_id) {
                debug!(
                    channel_id = %self.id,
                    subscription_id = %subscription_id,
                    "Dropping notifications of inactive subscription"
                );
                return;
            }

            let mut ids = self.ids.lock();
            let mut evicted = false;
            for value in values {
                let id = NotificationId::new(ids.notifications.next_id());
                let notification = Notification {
                    id,
                    subscription_id,
                    value,
                };
                evicted |= self.queue.enqueue(notification, monitor_interval);
            }

            if evicted && !self.notifications_lost.swap(true, Ordering::AcqRel) {
                warn!(
                    channel_id = %self.id,
                    queue_size = self.queue.max_size(),
                    "Notification queue full; notifications lost"
                );
            }
        }

        self.notify.notify_waiters();
    }
}

impl fmt::Debug for SubscriptionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionChannel")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("queue_size", &self.queue.max_size())
            .field("subscriptions", &self.subscription_count())
            .field("notifications_lost", &self.notifications_lost())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woopsa_core::hooks::NoOpModelAccessHooks;
    use woopsa_core::memory::MemoryModel;

    use crate::ids::IdRange;

    const EVERY: MonitorInterval = MonitorInterval::Every(Duration::from_millis(10));

    fn channel(model: Arc<MemoryModel>, queue_size: usize) -> Arc<SubscriptionChannel> {
        SubscriptionChannel::new(
            ChannelId::new(1),
            SubscriptionRoot::Server(model),
            queue_size,
            SubscriptionSettings::for_testing(),
            Arc::new(Scheduler::new(4)),
            Arc::new(NoOpModelAccessHooks),
        )
    }

    fn model_with(paths: &[&str]) -> Arc<MemoryModel> {
        let model = Arc::new(MemoryModel::new("server"));
        for path in paths {
            model.set(path, 0);
        }
        model
    }

    #[tokio::test]
    async fn test_publish_assigns_increasing_ids() {
        let channel = channel(model_with(&["A"]), 10);
        let id = channel
            .register_subscription("A", EVERY, Duration::from_secs(60))
            .await
            .unwrap();

        channel.publish(id, EVERY, vec![TimedValue::new(1), TimedValue::new(2)]);
        channel.publish(id, EVERY, vec![TimedValue::new(3)]);

        let notifications = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(10))
            .await
            .unwrap();
        let ids: Vec<u64> = notifications.iter().map(|n| n.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_wait_acknowledges_previous_batch() {
        let channel = channel(model_with(&["A"]), 10);
        let id = channel
            .register_subscription("A", EVERY, Duration::from_secs(60))
            .await
            .unwrap();
        channel.publish(id, EVERY, vec![TimedValue::new(1), TimedValue::new(2)]);

        let first = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        channel.publish(id, EVERY, vec![TimedValue::new(3)]);
        let second = channel
            .wait_notification(first[1].id, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, NotificationId::new(3));
    }

    fn ids(notifications: &[Notification]) -> Vec<u64> {
        notifications.iter().map(|n| n.id.get()).collect()
    }

    async fn ack(channel: &SubscriptionChannel, last: u64) -> Vec<Notification> {
        channel
            .wait_notification(NotificationId::new(last), Duration::from_millis(10))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ack_prunes_with_raised_id_minimum() {
        let range = IdRange::new(10, 20).unwrap();
        let channel = SubscriptionChannel::new(
            ChannelId::new(1),
            SubscriptionRoot::Server(model_with(&["A"])),
            32,
            SubscriptionSettings::for_testing().with_id_range(range),
            Arc::new(Scheduler::new(4)),
            Arc::new(NoOpModelAccessHooks),
        );
        let id = channel
            .register_subscription("A", EVERY, Duration::from_secs(60))
            .await
            .unwrap();

        channel.publish(id, EVERY, (1..=3).map(TimedValue::new).collect());
        let first = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(ids(&first), vec![10, 11, 12]);
        assert!(ack(&channel, 12).await.is_empty());

        // 13..=20 then wraps to 10 and 11
        channel.publish(id, EVERY, (4..=13).map(TimedValue::new).collect());
        let batch = ack(&channel, 12).await;
        assert_eq!(ids(&batch), vec![13, 14, 15, 16, 17, 18, 19, 20, 10, 11]);

        let after_wrap = ack(&channel, 20).await;
        assert_eq!(ids(&after_wrap), vec![10, 11]);
        assert_eq!(after_wrap[1].value, TimedValue::new(13));

        assert!(ack(&channel, 11).await.is_empty());
        assert!(!channel.notifications_lost());
        assert_eq!(channel.queue_stats().acknowledged, 13);
    }

    #[tokio::test]
    async fn test_ack_of_max_id_prunes_with_default_range() {
        let range = IdRange::default();
        let channel = channel(model_with(&["A"]), 10);
        let id = channel
            .register_subscription("A", EVERY, Duration::from_secs(60))
            .await
            .unwrap();
        {
            let mut ids = channel.ids.lock();
            ids.notifications = WrappingIdSequence::starting_after(range, range.max() - 1);
        }

        channel.publish(id, EVERY, vec![TimedValue::new(1)]);
        let first = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(ids(&first), vec![range.max()]);

        let second = channel
            .wait_notification(NotificationId::new(range.max()), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    /// Stops its channel the moment a registration touches the model.
    struct StopOnAccess {
        channel: Mutex<Weak<SubscriptionChannel>>,
    }

    impl ModelAccessHooks for StopOnAccess {
        fn before_access(&self, _path: &str) {
            if let Some(channel) = self.channel.lock().upgrade() {
                channel.stop();
            }
        }

        fn after_access(&self, _path: &str) {}
    }

    #[tokio::test]
    async fn test_register_refused_when_stopped_while_resolving() {
        let hooks = Arc::new(StopOnAccess {
            channel: Mutex::new(Weak::new()),
        });
        let channel = SubscriptionChannel::new(
            ChannelId::new(1),
            SubscriptionRoot::Server(model_with(&["A"])),
            10,
            SubscriptionSettings::for_testing(),
            Arc::new(Scheduler::new(4)),
            hooks.clone(),
        );
        *hooks.channel.lock() = Arc::downgrade(&channel);

        let err = channel
            .register_subscription("A", EVERY, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::ChannelStopped));
        assert_eq!(channel.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_empty() {
        let channel = channel(model_with(&["A"]), 10);
        let started = Instant::now();
        let notifications = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(notifications.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_publish_wakes_waiter() {
        let channel = channel(model_with(&["A"]), 10);
        let id = channel
            .register_subscription("A", EVERY, Duration::from_secs(60))
            .await
            .unwrap();

        let waiter = {
            let channel = channel.clone();
            tokio::spawn(async move {
                channel
                    .wait_notification(NotificationId::RESET, Duration::from_secs(10))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.publish(id, EVERY, vec![TimedValue::new(7)]);

        let notifications = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_waiters() {
        let channel = channel(model_with(&["A"]), 10);
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let channel = channel.clone();
                tokio::spawn(async move {
                    channel
                        .wait_notification(NotificationId::RESET, Duration::from_secs(30))
                        .await
                })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        channel.stop();
        channel.stop();
        for waiter in waiters {
            let result = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
            assert!(result.unwrap().is_empty());
        }
        assert!(matches!(
            channel
                .wait_notification(NotificationId::RESET, Duration::from_millis(1))
                .await,
            Err(SubscriptionError::ChannelStopped)
        ));
    }

    #[tokio::test]
    async fn test_lost_flag_requires_reset() {
        let channel = channel(model_with(&["A", "B", "C"]), 1);
        let mut ids = Vec::new();
        for path in ["A", "B", "C"] {
            ids.push(
                channel
                    .register_subscription(path, EVERY, Duration::from_secs(60))
                    .await
                    .unwrap(),
            );
        }
        for id in &ids {
            channel.publish(*id, EVERY, vec![TimedValue::new(1)]);
        }
        assert!(channel.notifications_lost());

        let err = channel
            .wait_notification(NotificationId::new(5), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotificationsLost { .. }));

        let notifications = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(!channel.notifications_lost());
    }

    #[tokio::test]
    async fn test_unregister_purges_and_is_idempotent() {
        let channel = channel(model_with(&["A", "B"]), 10);
        let a = channel
            .register_subscription("A", EVERY, Duration::from_secs(60))
            .await
            .unwrap();
        let b = channel
            .register_subscription("B", EVERY, Duration::from_secs(60))
            .await
            .unwrap();
        channel.publish(a, EVERY, vec![TimedValue::new(1), TimedValue::new(2)]);
        channel.publish(b, EVERY, vec![TimedValue::new(3)]);

        assert!(channel.unregister_subscription(a).await);
        assert!(!channel.unregister_subscription(a).await);

        // publishing for a removed subscription is dropped
        channel.publish(a, EVERY, vec![TimedValue::new(4)]);

        let notifications = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(notifications.iter().all(|n| n.subscription_id == b));
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_register_unknown_path() {
        let channel = channel(model_with(&[]), 10);
        let err = channel
            .register_subscription("Nope", EVERY, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound { .. }));
        assert_eq!(channel.subscription_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_timeout() {
        let channel = channel(model_with(&[]), 10);
        assert!(!channel.client_timed_out());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(channel.client_timed_out());

        let _ = channel
            .wait_notification(NotificationId::RESET, Duration::from_millis(1))
            .await;
        assert!(!channel.client_timed_out());
    }
}
