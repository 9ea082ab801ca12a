// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The subscription service.
//!
//! One service per served root. It keeps the channels of that root keyed by
//! channel id and exposes the four remote operations:
//!
//! | Operation | Fails with |
//! |---|---|
//! | `create_channel` | never |
//! | `register_subscription` | invalid channel, not found |
//! | `unregister_subscription` | invalid channel |
//! | `wait_notification` | invalid channel, notifications lost |
//!
//! A background sweep disposes channels whose client went quiet for longer
//! than the channel lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use woopsa_core::error::{SubscriptionError, SubscriptionResult};
use woopsa_core::hooks::{ModelAccessHooks, NoOpModelAccessHooks};
use woopsa_core::model::ObjectModel;
use woopsa_core::path::PropertyLink;
use woopsa_core::types::{ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId};

use crate::channel::SubscriptionChannel;
use crate::ids::ChannelIdGenerator;
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::settings::SubscriptionSettings;
use crate::subscription::SubscriptionRoot;

// =============================================================================
// ServiceStats
// =============================================================================

/// Snapshot of service counters.
///
/// Queue totals include channels that were closed or reaped since the
/// service started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Open channels.
    pub channels: usize,
    /// Subscriptions across open channels.
    pub subscriptions: usize,
    /// Notifications waiting across open channels.
    pub queued: usize,
    /// Open channels whose lost flag is set.
    pub lost_channels: usize,
    /// Notifications enqueued.
    pub enqueued: u64,
    /// Notifications evicted by a full queue.
    pub evicted: u64,
    /// Notifications acknowledged by clients.
    pub acknowledged: u64,
    /// Timer counters.
    pub scheduler: SchedulerStats,
}

/// Queue totals of channels no longer in the registry.
#[derive(Debug, Default)]
struct RetiredTotals {
    enqueued: AtomicU64,
    evicted: AtomicU64,
    acknowledged: AtomicU64,
}

impl RetiredTotals {
    fn add(&self, channel: &SubscriptionChannel) {
        let stats = channel.queue_stats();
        self.enqueued.fetch_add(stats.enqueued, Ordering::Relaxed);
        self.evicted.fetch_add(stats.evicted, Ordering::Relaxed);
        self.acknowledged.fetch_add(stats.acknowledged, Ordering::Relaxed);
    }
}

// =============================================================================
// SubscriptionService
// =============================================================================

/// Registry of subscription channels for one root.
pub struct SubscriptionService {
    root: SubscriptionRoot,
    settings: SubscriptionSettings,
    channel_ids: Arc<ChannelIdGenerator>,
    channels: RwLock<HashMap<ChannelId, Arc<SubscriptionChannel>>>,
    scheduler: Arc<Scheduler>,
    hooks: Arc<dyn ModelAccessHooks>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    retired: RetiredTotals,
}

impl SubscriptionService {
    /// Creates a service for a server model. Must run inside a tokio runtime.
    pub fn new(model: Arc<dyn ObjectModel>, settings: SubscriptionSettings) -> Arc<Self> {
        Self::builder(SubscriptionRoot::Server(model))
            .settings(settings)
            .build()
    }

    /// Creates a builder.
    pub fn builder(root: SubscriptionRoot) -> SubscriptionServiceBuilder {
        SubscriptionServiceBuilder::new(root)
    }

    /// Engine settings.
    pub fn settings(&self) -> &SubscriptionSettings {
        &self.settings
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Returns an open channel.
    pub fn channel(&self, channel_id: ChannelId) -> Option<Arc<SubscriptionChannel>> {
        self.channels.read().get(&channel_id).cloned()
    }

    /// Counters across every channel plus the scheduler.
    pub fn stats(&self) -> ServiceStats {
        let mut stats = ServiceStats {
            enqueued: self.retired.enqueued.load(Ordering::Relaxed),
            evicted: self.retired.evicted.load(Ordering::Relaxed),
            acknowledged: self.retired.acknowledged.load(Ordering::Relaxed),
            scheduler: self.scheduler.stats(),
            ..ServiceStats::default()
        };

        let channels = self.channels.read();
        stats.channels = channels.len();
        for channel in channels.values() {
            let queue = channel.queue_stats();
            stats.subscriptions += channel.subscription_count();
            stats.queued += queue.len;
            stats.enqueued += queue.enqueued;
            stats.evicted += queue.evicted;
            stats.acknowledged += queue.acknowledged;
            if channel.notifications_lost() {
                stats.lost_channels += 1;
            }
        }
        stats
    }

    fn require_channel(&self, channel_id: ChannelId) -> SubscriptionResult<Arc<SubscriptionChannel>> {
        self.channel(channel_id)
            .ok_or_else(|| SubscriptionError::invalid_channel(channel_id))
    }

    // =========================================================================
    // Remote operations
    // =========================================================================

    /// Opens a channel whose queue holds `queue_size` notifications.
    pub fn create_channel(&self, queue_size: usize) -> ChannelId {
        let channel_id = loop {
            let candidate = self.channel_ids.next_id();
            if !self.channels.read().contains_key(&candidate) {
                break candidate;
            }
        };

        let channel = SubscriptionChannel::new(
            channel_id,
            self.root.clone(),
            queue_size,
            self.settings.clone(),
            self.scheduler.clone(),
            self.hooks.clone(),
        );
        self.channels.write().insert(channel_id, channel);

        info!(channel_id = %channel_id, queue_size, "Subscription channel created");
        channel_id
    }

    /// Registers a subscription on `property_link` (`path` or `server#path`).
    pub async fn register_subscription(
        &self,
        channel_id: ChannelId,
        property_link: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
    ) -> SubscriptionResult<SubscriptionId> {
        let channel = self.require_channel(channel_id)?;

        let link = PropertyLink::parse(property_link);
        if let SubscriptionRoot::Server(model) = &self.root {
            if !link.targets(model.name()) {
                return Err(SubscriptionError::not_found(link.to_string()));
            }
        }

        channel
            .register_subscription(link.path(), monitor_interval, publish_interval)
            .await
    }

    /// Unregisters a subscription. Returns `false` if it was unknown.
    pub async fn unregister_subscription(
        &self,
        channel_id: ChannelId,
        subscription_id: SubscriptionId,
    ) -> SubscriptionResult<bool> {
        let channel = self.require_channel(channel_id)?;
        Ok(channel.unregister_subscription(subscription_id).await)
    }

    /// Long-polls a channel with the configured wait timeout.
    pub async fn wait_notification(
        &self,
        channel_id: ChannelId,
        last_notification_id: NotificationId,
    ) -> SubscriptionResult<Vec<Notification>> {
        self.wait_notification_with_timeout(channel_id, last_notification_id, self.settings.wait_timeout)
            .await
    }

    /// Long-polls a channel with an explicit timeout.
    pub async fn wait_notification_with_timeout(
        &self,
        channel_id: ChannelId,
        last_notification_id: NotificationId,
        timeout: Duration,
    ) -> SubscriptionResult<Vec<Notification>> {
        let channel = self.require_channel(channel_id)?;
        channel.wait_notification(last_notification_id, timeout).await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Closes and disposes a channel. Returns `false` if it was unknown.
    pub async fn close_channel(&self, channel_id: ChannelId) -> bool {
        let removed = self.channels.write().remove(&channel_id);
        match removed {
            Some(channel) => {
                self.retired.add(&channel);
                channel.dispose().await;
                true
            }
            None => false,
        }
    }

    /// Disposes every channel whose client timed out. Returns how many.
    pub async fn sweep(&self) -> usize {
        let expired: Vec<Arc<SubscriptionChannel>> = {
            let mut channels = self.channels.write();
            let ids: Vec<ChannelId> = channels
                .iter()
                .filter(|(_, channel)| channel.client_timed_out())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| channels.remove(id)).collect()
        };

        for channel in &expired {
            self.retired.add(channel);
            warn!(channel_id = %channel.id(), "Client timed out; reaping channel");
            channel.dispose().await;
        }
        expired.len()
    }

    /// Starts the periodic sweep. Calling it again has no effect.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.settings.sweep_interval.max(Duration::from_millis(10));
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(service) = weak.upgrade() else { break };
                let reaped = service.sweep().await;
                if reaped > 0 {
                    debug!(reaped, remaining = service.channel_count(), "Sweep finished");
                }
            }
        }));
        debug!(period_ms = period.as_millis() as u64, "Channel sweeper started");
    }

    /// Stops the sweeper and scheduler and disposes every channel.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }

        let channels: Vec<_> = self.channels.write().drain().map(|(_, c)| c).collect();
        let count = channels.len();
        for channel in channels {
            self.retired.add(&channel);
            channel.dispose().await;
        }
        self.scheduler.shutdown();
        info!(channels = count, "Subscription service shut down");
    }
}

impl Drop for SubscriptionService {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.abort();
        }
        for channel in self.channels.get_mut().values() {
            channel.stop();
        }
    }
}

impl fmt::Debug for SubscriptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionService")
            .field("root", &self.root)
            .field("channels", &self.channel_count())
            .field("settings", &self.settings)
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`SubscriptionService`].
pub struct SubscriptionServiceBuilder {
    root: SubscriptionRoot,
    settings: SubscriptionSettings,
    channel_ids: Option<Arc<ChannelIdGenerator>>,
    hooks: Option<Arc<dyn ModelAccessHooks>>,
}

impl SubscriptionServiceBuilder {
    fn new(root: SubscriptionRoot) -> Self {
        Self {
            root,
            settings: SubscriptionSettings::default(),
            channel_ids: None,
            hooks: None,
        }
    }

    /// Sets the engine settings.
    pub fn settings(mut self, settings: SubscriptionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Shares a process-wide channel id generator.
    pub fn channel_ids(mut self, generator: Arc<ChannelIdGenerator>) -> Self {
        self.channel_ids = Some(generator);
        self
    }

    /// Sets the model access hooks.
    pub fn hooks(mut self, hooks: Arc<dyn ModelAccessHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Builds the service. Must run inside a tokio runtime.
    pub fn build(self) -> Arc<SubscriptionService> {
        Arc::new(SubscriptionService {
            scheduler: Arc::new(Scheduler::new(self.settings.scheduler_workers)),
            root: self.root,
            settings: self.settings,
            channel_ids: self
                .channel_ids
                .unwrap_or_else(|| Arc::new(ChannelIdGenerator::new())),
            channels: RwLock::new(HashMap::new()),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoOpModelAccessHooks)),
            sweeper: Mutex::new(None),
            retired: RetiredTotals::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woopsa_core::memory::MemoryModel;
    use woopsa_core::types::TimedValue;

    use crate::subscription::NotificationSink;

    fn service() -> Arc<SubscriptionService> {
        let model = Arc::new(MemoryModel::new("server"));
        model.set("Votes", 0);
        SubscriptionService::new(model, SubscriptionSettings::for_testing())
    }

    #[tokio::test]
    async fn test_unknown_channel_is_invalid() {
        let service = service();
        let bogus = ChannelId::new(12345);

        let err = service
            .register_subscription(bogus, "Votes", MonitorInterval::default(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidChannel { .. }));
        assert!(service.unregister_subscription(bogus, SubscriptionId::new(1)).await.is_err());
        assert!(service.wait_notification(bogus, NotificationId::RESET).await.is_err());
    }

    #[tokio::test]
    async fn test_foreign_server_link_is_not_found() {
        let service = service();
        let channel = service.create_channel(10);

        let err = service
            .register_subscription(channel, "other#Votes", MonitorInterval::default(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound { .. }));

        assert!(service
            .register_subscription(channel, "server#/Votes", MonitorInterval::default(), Duration::from_millis(10))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_shared_generator_gives_distinct_ids() {
        let generator = Arc::new(ChannelIdGenerator::with_seed(10));
        let model: Arc<dyn ObjectModel> = Arc::new(MemoryModel::new("server"));
        let a = SubscriptionService::builder(SubscriptionRoot::Server(model.clone()))
            .channel_ids(generator.clone())
            .build();
        let b = SubscriptionService::builder(SubscriptionRoot::Server(model))
            .channel_ids(generator)
            .build();

        assert_eq!(a.create_channel(1), ChannelId::new(11));
        assert_eq!(b.create_channel(1), ChannelId::new(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reaps_idle_channels() {
        let service = service();
        let idle = service.create_channel(10);
        let busy = service.create_channel(10);

        tokio::time::advance(Duration::from_secs(3)).await;
        service
            .wait_notification_with_timeout(busy, NotificationId::RESET, Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(service.sweep().await, 1);
        assert!(service.channel(idle).is_none());
        assert!(service.channel(busy).is_some());
    }

    #[tokio::test]
    async fn test_stats_keep_totals_of_closed_channels() {
        let service = service();
        let open = service.create_channel(10);
        let closed = service.create_channel(1);
        for channel in [open, closed] {
            service
                .register_subscription(channel, "Votes", MonitorInterval::default(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        let sink = service.channel(closed).unwrap();
        let id = SubscriptionId::new(1);
        let every = MonitorInterval::Every(Duration::from_millis(10));
        sink.publish(id, every, vec![TimedValue::new(1), TimedValue::new(2)]);

        let stats = service.stats();
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.subscriptions, 2);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.lost_channels, 1);
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.evicted, 1);

        assert!(service.close_channel(closed).await);
        let stats = service.stats();
        assert_eq!(stats.channels, 1);
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.lost_channels, 0);
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.evicted, 1);
    }

    #[tokio::test]
    async fn test_close_channel_invalidates_it() {
        let service = service();
        let channel = service.create_channel(10);
        assert!(service.close_channel(channel).await);
        assert!(!service.close_channel(channel).await);
        assert!(matches!(
            service.wait_notification(channel, NotificationId::RESET).await,
            Err(SubscriptionError::InvalidChannel { .. })
        ));
    }
}
