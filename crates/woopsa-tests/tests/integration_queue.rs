// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Queue Integration Tests
//!
//! Notification ids, the bounded queue and acknowledgement pruning.
//!
//! - `test_ids_*`: wrapping id sequences
//! - `test_queue_*`: eviction, coalescing, pruning and purging

use std::time::Duration;

use woopsa_core::types::{MonitorInterval, NotificationId, SubscriptionId, TimedValue};
use woopsa_subscription::{ChannelIdGenerator, IdRange, NotificationQueue, WrappingIdSequence};

use woopsa_tests::common::fixtures::NotificationFixtures as N;

const EVERY: MonitorInterval = MonitorInterval::Every(Duration::from_millis(10));

// =============================================================================
// Id Tests
// =============================================================================

#[test]
fn test_ids_increase_then_wrap_to_min() {
    let range = IdRange::new(3, 7).unwrap();
    let mut sequence = WrappingIdSequence::new(range);
    let ids: Vec<u64> = (0..12).map(|_| sequence.next_id()).collect();

    assert_eq!(ids, vec![3, 4, 5, 6, 7, 3, 4, 5, 6, 7, 3, 4]);
    assert!(!ids.contains(&0));
}

#[test]
fn test_ids_strictly_increase_between_wraps() {
    let mut sequence = WrappingIdSequence::new(IdRange::default());
    let ids: Vec<u64> = (0..1_000).map(|_| sequence.next_id()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_ids_zero_never_assigned() {
    let range = IdRange::new(1, 2).unwrap();
    let mut sequence = WrappingIdSequence::starting_after(range, 0);
    for _ in 0..100 {
        assert_ne!(sequence.next_id(), 0);
    }
    assert!(IdRange::new(0, 10).is_none());
}

#[test]
fn test_ids_age_orders_across_wrap() {
    let range = IdRange::new(1, 10).unwrap();
    // enqueued in the order 9, 10, 1, 2 starting from origin 8
    let ages: Vec<u64> = [9, 10, 1, 2].iter().map(|id| range.age(*id, 8)).collect();
    assert_eq!(ages, vec![1, 2, 3, 4]);
}

#[test]
fn test_ids_channel_generators_are_monotonic() {
    let generator = ChannelIdGenerator::with_seed(41);
    assert_eq!(generator.next_id().get(), 42);
    assert_eq!(generator.next_id().get(), 43);

    let wrapping = ChannelIdGenerator::with_seed(ChannelIdGenerator::RANGE.max());
    assert_eq!(wrapping.next_id().get(), ChannelIdGenerator::RANGE.min());
}

// =============================================================================
// Queue Tests
// =============================================================================

#[test]
fn test_queue_bounded_keeps_most_recent() {
    let max_size = 4;
    let extra = 3;
    let queue = NotificationQueue::new(max_size, IdRange::default());

    let mut discarded = Vec::new();
    for i in 1..=(max_size + extra) as u64 {
        discarded.push(queue.enqueue(N::integer(i, i), EVERY));
    }

    assert_eq!(queue.len(), max_size);
    assert_eq!(N::ids(&queue.peek(100)), vec![4, 5, 6, 7]);
    assert!(discarded[..max_size].iter().all(|d| !d));
    assert!(discarded[max_size..].iter().all(|d| *d));
}

#[test]
fn test_queue_coalesces_last_value_only() {
    let queue = NotificationQueue::new(10, IdRange::default());
    for i in 1..=5 {
        queue.enqueue(N::integer(i, 1), MonitorInterval::LastPublishedValueOnly);
    }

    let items = queue.peek(10);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].value, TimedValue::new(5i64));
}

#[test]
fn test_queue_coalescing_leaves_other_subscriptions() {
    let queue = NotificationQueue::new(10, IdRange::default());
    queue.enqueue(N::integer(1, 1), EVERY);
    queue.enqueue(N::integer(2, 2), MonitorInterval::LastPublishedValueOnly);
    queue.enqueue(N::integer(3, 1), EVERY);
    queue.enqueue(N::integer(4, 2), MonitorInterval::LastPublishedValueOnly);

    assert_eq!(N::ids(&queue.peek(10)), vec![1, 3, 4]);
}

#[test]
fn test_queue_prune_keeps_newer_in_order() {
    let queue = NotificationQueue::new(20, IdRange::default());
    for i in 1..=10 {
        queue.enqueue(N::integer(i, i % 3), EVERY);
    }

    let origin = queue.remove_older(NotificationId::RESET, NotificationId::new(6));
    assert_eq!(origin, NotificationId::new(6));
    assert_eq!(N::ids(&queue.peek(20)), vec![7, 8, 9, 10]);
}

#[test]
fn test_queue_prune_across_wrap() {
    let range = IdRange::new(1, 8).unwrap();
    let queue = NotificationQueue::new(20, range);
    let mut sequence = WrappingIdSequence::starting_after(range, 5);
    let mut enqueued = Vec::new();
    for _ in 0..6 {
        let id = sequence.next_id();
        enqueued.push(id);
        queue.enqueue(N::integer(id, 1), EVERY);
    }
    assert_eq!(enqueued, vec![6, 7, 8, 1, 2, 3]);

    let origin = queue.remove_older(NotificationId::new(5), NotificationId::new(1));
    assert_eq!(origin, NotificationId::new(1));

    let remaining = N::ids(&queue.peek(20));
    assert_eq!(remaining, vec![2, 3]);
    let ack_age = range.age(1, 5);
    assert!(remaining.iter().all(|id| range.age(*id, 5) > ack_age));
}

#[test]
fn test_queue_prune_from_origin_before_queued_ids() {
    let queue = NotificationQueue::new(10, IdRange::default());
    for i in 5..=8 {
        queue.enqueue(N::integer(i, 1), EVERY);
    }

    // 1..=4 were already acknowledged and are gone
    let origin = queue.remove_older(NotificationId::new(4), NotificationId::new(6));
    assert_eq!(origin, NotificationId::new(6));
    assert_eq!(N::ids(&queue.peek(10)), vec![7, 8]);
}

#[test]
fn test_queue_purge_subscription_anywhere() {
    let queue = NotificationQueue::new(10, IdRange::default());
    queue.enqueue(N::integer(1, 1), EVERY);
    queue.enqueue(N::integer(2, 2), EVERY);
    queue.enqueue(N::integer(3, 1), EVERY);
    queue.enqueue(N::integer(4, 3), EVERY);

    assert_eq!(queue.remove_for_subscription(SubscriptionId::new(1)), 2);
    let remaining = queue.peek(10);
    assert!(remaining.iter().all(|n| n.subscription_id != SubscriptionId::new(1)));
    assert_eq!(N::ids(&remaining), vec![2, 4]);

    let stats = queue.stats();
    assert_eq!(stats.enqueued, 4);
    assert_eq!(stats.purged, 2);
}
