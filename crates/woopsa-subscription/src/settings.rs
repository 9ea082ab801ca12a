// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine tuning.

use std::time::Duration;

use crate::ids::IdRange;

/// Settings shared by a service and all of its channels.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSettings {
    /// Range subscription and notification ids cycle through.
    pub id_range: IdRange,
    /// How long a wait blocks on an empty queue.
    pub wait_timeout: Duration,
    /// Most notifications returned by one wait.
    pub max_notifications_per_wait: usize,
    /// Idle time after which a channel is reaped.
    pub channel_lifetime: Duration,
    /// Period of the idle-channel sweep.
    pub sweep_interval: Duration,
    /// Most subscription ticks running at once.
    pub scheduler_workers: usize,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            id_range: IdRange::DEFAULT,
            wait_timeout: Duration::from_secs(5),
            max_notifications_per_wait: 1_000,
            channel_lifetime: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
            scheduler_workers: 64,
        }
    }
}

impl SubscriptionSettings {
    /// Sets the id range.
    pub fn with_id_range(mut self, id_range: IdRange) -> Self {
        self.id_range = id_range;
        self
    }

    /// Sets the wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Sets the per-wait batch limit.
    pub fn with_max_notifications_per_wait(mut self, max: usize) -> Self {
        self.max_notifications_per_wait = max.max(1);
        self
    }

    /// Sets the channel lifetime.
    pub fn with_channel_lifetime(mut self, lifetime: Duration) -> Self {
        self.channel_lifetime = lifetime;
        self
    }

    /// Sets the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the scheduler concurrency.
    pub fn with_scheduler_workers(mut self, workers: usize) -> Self {
        self.scheduler_workers = workers.max(1);
        self
    }

    /// Short timeouts and lifetimes for tests.
    pub fn for_testing() -> Self {
        Self {
            wait_timeout: Duration::from_millis(500),
            channel_lifetime: Duration::from_secs(5),
            sweep_interval: Duration::from_millis(100),
            scheduler_workers: 16,
            ..Self::default()
        }
    }
}
