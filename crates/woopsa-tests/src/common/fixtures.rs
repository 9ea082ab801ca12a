// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures

use std::sync::Arc;
use std::time::Duration;

use woopsa_core::memory::MemoryModel;
use woopsa_core::types::{MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue};
use woopsa_subscription::SubscriptionSettings;

/// Shorthand for a millisecond duration.
pub const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// A 10 ms monitor interval.
pub const FAST_MONITOR: MonitorInterval = MonitorInterval::Every(Duration::from_millis(10));

/// A 20 ms publish interval.
pub const FAST_PUBLISH: Duration = Duration::from_millis(20);

// =============================================================================
// Settings
// =============================================================================

/// Pre-built engine settings.
pub struct SettingsFixtures;

impl SettingsFixtures {
    /// Fast settings with a 2 s wait timeout.
    pub fn fast() -> SubscriptionSettings {
        SubscriptionSettings::for_testing().with_wait_timeout(Duration::from_secs(2))
    }

    /// Fast settings whose channels are reaped after `lifetime` of silence.
    pub fn short_lived(lifetime: Duration) -> SubscriptionSettings {
        SubscriptionSettings::for_testing()
            .with_channel_lifetime(lifetime)
            .with_sweep_interval(ms(20))
    }
}

// =============================================================================
// Models
// =============================================================================

/// Pre-populated models.
pub struct ModelFixtures;

impl ModelFixtures {
    /// A model with `Votes` and a small production line.
    pub fn plant() -> Arc<MemoryModel> {
        let model = Arc::new(MemoryModel::new("plant"));
        model.set("Votes", 0i64);
        model.set("Line1/Speed", 12.5);
        model.set("Line1/Running", true);
        model.define("Line1/Serial", "L1-0001", false);
        model
    }

    /// A model with `count` integer properties named `P0`, `P1`, ...
    pub fn numbered(count: usize) -> Arc<MemoryModel> {
        let model = Arc::new(MemoryModel::new("numbered"));
        for i in 0..count {
            model.set(&format!("P{}", i), i as i64);
        }
        model
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Pre-built notifications.
pub struct NotificationFixtures;

impl NotificationFixtures {
    /// A notification with an integer value equal to its id.
    pub fn integer(id: u64, subscription: u64) -> Notification {
        Notification {
            id: NotificationId::new(id),
            subscription_id: SubscriptionId::new(subscription),
            value: TimedValue::new(id as i64),
        }
    }

    /// Raw ids of a notification list.
    pub fn ids(notifications: &[Notification]) -> Vec<u64> {
        notifications.iter().map(|n| n.id.get()).collect()
    }
}
