// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded per-channel notification queue.
//!
//! The queue keeps notifications in enqueue order. Consumers peek at it
//! rather than dequeue; items leave only when the client acknowledges them
//! (`remove_older`), when their subscription is unregistered
//! (`remove_for_subscription`), or when the queue is full and the oldest
//! items are evicted to make room.
//!
//! # Example
//!
//! ```
//! use woopsa_core::types::{MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue};
//! use woopsa_subscription::{IdRange, NotificationQueue};
//!
//! let queue = NotificationQueue::new(2, IdRange::default());
//! let every = MonitorInterval::Every(std::time::Duration::from_millis(10));
//!
//! for id in 1..=3 {
//!     let n = Notification {
//!         id: NotificationId::new(id),
//!         subscription_id: SubscriptionId::new(1),
//!         value: TimedValue::new(id as i64),
//!     };
//!     let discarded = queue.enqueue(n, every);
//!     assert_eq!(discarded, id == 3);
//! }
//! assert_eq!(queue.len(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use woopsa_core::types::{MonitorInterval, Notification, NotificationId, SubscriptionId};

use crate::ids::IdRange;

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items currently queued.
    pub len: usize,
    /// Items ever enqueued.
    pub enqueued: u64,
    /// Items evicted because the queue was full.
    pub evicted: u64,
    /// Items replaced by a newer value of a last-value-only subscription.
    pub coalesced: u64,
    /// Items removed after acknowledgement.
    pub acknowledged: u64,
    /// Items removed because their subscription was unregistered.
    pub purged: u64,
}

#[derive(Debug, Default)]
struct QueueStatsInner {
    enqueued: AtomicU64,
    evicted: AtomicU64,
    coalesced: AtomicU64,
    acknowledged: AtomicU64,
    purged: AtomicU64,
}

impl QueueStatsInner {
    fn add(counter: &AtomicU64, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// NotificationQueue
// =============================================================================

/// A bounded FIFO of notifications with coalescing and acknowledgement pruning.
///
/// All operations take a single internal mutex and never call out while
/// holding it, so any number of producers and a consumer may share one
/// queue.
#[derive(Debug)]
pub struct NotificationQueue {
    items: Mutex<VecDeque<Notification>>,
    max_size: usize,
    ids: IdRange,
    stats: QueueStatsInner,
}

impl NotificationQueue {
    /// Creates a queue holding at most `max_size` items (at least one).
    pub fn new(max_size: usize, ids: IdRange) -> Self {
        let max_size = max_size.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(max_size.min(4_096))),
            max_size,
            ids,
            stats: QueueStatsInner::default(),
        }
    }

    /// Maximum number of queued items.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Appends a notification.
    ///
    /// For a last-value-only subscription, earlier queued items of the same
    /// subscription are dropped first. The oldest items are then evicted
    /// until there is room. Returns `true` if anything was evicted.
    pub fn enqueue(&self, notification: Notification, monitor_interval: MonitorInterval) -> bool {
        let mut items = self.items.lock();

        if monitor_interval.is_last_published_value_only() {
            let before = items.len();
            let subscription_id = notification.subscription_id;
            items.retain(|n| n.subscription_id != subscription_id);
            QueueStatsInner::add(&self.stats.coalesced, before - items.len());
        }

        let mut evicted = 0usize;
        while items.len() >= self.max_size {
            if items.pop_front().is_none() {
                break;
            }
            evicted += 1;
        }

        trace!(
            notification_id = %notification.id,
            subscription_id = %notification.subscription_id,
            evicted,
            "Notification enqueued"
        );
        items.push_back(notification);
        drop(items);

        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        QueueStatsInner::add(&self.stats.evicted, evicted);
        evicted > 0
    }

    /// Returns up to `max_count` items from the head, in order, without removing them.
    pub fn peek(&self, max_count: usize) -> Vec<Notification> {
        self.items.lock().iter().take(max_count).cloned().collect()
    }

    /// Removes head items no newer than `up_to`, measured from `origin`.
    ///
    /// Stops at the first newer item. Returns the id of the last removed
    /// item, or `origin` if nothing was removed.
    pub fn remove_older(&self, origin: NotificationId, up_to: NotificationId) -> NotificationId {
        let limit = self.ids.age(up_to.get(), origin.get());
        let mut new_origin = origin;
        let mut removed = 0usize;

        let mut items = self.items.lock();
        while let Some(head) = items.front() {
            if self.ids.age(head.id.get(), origin.get()) > limit {
                break;
            }
            new_origin = head.id;
            items.pop_front();
            removed += 1;
        }
        drop(items);

        QueueStatsInner::add(&self.stats.acknowledged, removed);
        new_origin
    }

    /// Removes every queued item of `subscription_id`. Returns how many were removed.
    ///
    /// The subscription is already unregistered when this runs, so its items
    /// may sit anywhere in the queue, not only at the head.
    pub fn remove_for_subscription(&self, subscription_id: SubscriptionId) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|n| n.subscription_id != subscription_id);
        let removed = before - items.len();
        drop(items);

        QueueStatsInner::add(&self.stats.purged, removed);
        removed
    }

    /// Removes every queued item.
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.len(),
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
            coalesced: self.stats.coalesced.load(Ordering::Relaxed),
            acknowledged: self.stats.acknowledged.load(Ordering::Relaxed),
            purged: self.stats.purged.load(Ordering::Relaxed),
        }
    }
}
