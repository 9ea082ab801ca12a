// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A subscription service over a memory model, plus helpers to drain
//! channels the way a well-behaved client does.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use woopsa_client::LocalTransport;
use woopsa_core::memory::MemoryModel;
use woopsa_core::model::ObjectModel;
use woopsa_core::types::{ChannelId, Notification, NotificationId, SubscriptionId};
use woopsa_subscription::{SubscriptionService, SubscriptionSettings};

use crate::common::fixtures::{ModelFixtures, SettingsFixtures, FAST_MONITOR, FAST_PUBLISH};

// =============================================================================
// ServiceHarness
// =============================================================================

/// A running subscription service and the model it serves.
pub struct ServiceHarness {
    /// The served model.
    pub model: Arc<MemoryModel>,
    /// The service under test.
    pub service: Arc<SubscriptionService>,
}

impl ServiceHarness {
    /// The plant model with fast settings. Must run inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_model(ModelFixtures::plant(), SettingsFixtures::fast())
    }

    /// A service over `model`. Must run inside a tokio runtime.
    pub fn with_model(model: Arc<MemoryModel>, settings: SubscriptionSettings) -> Self {
        let service = SubscriptionService::new(model.clone() as Arc<dyn ObjectModel>, settings);
        Self { model, service }
    }

    /// An in-process transport to this service.
    pub fn transport(&self) -> Arc<LocalTransport> {
        Arc::new(LocalTransport::new(
            self.service.clone(),
            self.model.clone() as Arc<dyn ObjectModel>,
        ))
    }

    /// Registers `path` with the fast monitor and publish intervals.
    pub async fn register(&self, channel: ChannelId, path: &str) -> SubscriptionId {
        self.service
            .register_subscription(channel, path, FAST_MONITOR, FAST_PUBLISH)
            .await
            .unwrap_or_else(|e| panic!("register {} failed: {}", path, e))
    }

    /// Long-polls `channel`, acknowledging as it goes, until `done` holds for
    /// everything received so far or `timeout` elapses.
    pub async fn drain_until<F>(&self, channel: ChannelId, timeout: Duration, done: F) -> Vec<Notification>
    where
        F: Fn(&[Notification]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut received: Vec<Notification> = Vec::new();
        let mut last = NotificationId::RESET;

        while !done(&received) && Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let batch = self
                .service
                .wait_notification_with_timeout(channel, last, remaining.min(Duration::from_millis(500)))
                .await
                .unwrap_or_else(|e| panic!("wait failed: {}", e));
            if let Some(newest) = batch.last() {
                last = newest.id;
            }
            received.extend(batch);
        }
        received
    }
}

impl Default for ServiceHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts notifications per subscription.
pub fn count_by_subscription(notifications: &[Notification]) -> HashMap<SubscriptionId, usize> {
    let mut counts = HashMap::new();
    for notification in notifications {
        *counts.entry(notification.subscription_id).or_insert(0) += 1;
    }
    counts
}

/// Polls `condition` every 5 ms until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Runs `test` and fails if it takes longer than `timeout`.
pub async fn with_timeout<F, T>(timeout: Duration, test: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, test)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {:?}", timeout))
}
