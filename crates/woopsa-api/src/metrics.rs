// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Prometheus metrics for the subscription service and its HTTP front.
//!
//! Service gauges and counters are refreshed from a [`ServiceStats`]
//! snapshot on every scrape; request counters are updated by the handlers.
//!
//! # Metrics Overview
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `woopsa_channels` | Gauge | Open subscription channels |
//! | `woopsa_subscriptions` | Gauge | Subscriptions across open channels |
//! | `woopsa_queued_notifications` | Gauge | Notifications waiting for a client |
//! | `woopsa_channels_notifications_lost` | Gauge | Channels whose lost flag is set |
//! | `woopsa_notifications_enqueued_total` | Counter | Notifications enqueued |
//! | `woopsa_notifications_evicted_total` | Counter | Notifications evicted by full queues |
//! | `woopsa_notifications_acknowledged_total` | Counter | Notifications acknowledged |
//! | `woopsa_scheduler_ticks_total` | Counter | Monitor and publish ticks run |
//! | `woopsa_scheduler_overlapping_ticks_total` | Counter | Ticks skipped while the previous one ran |
//! | `woopsa_scheduler_panicked_ticks_total` | Counter | Ticks that panicked |
//! | `woopsa_api_requests_total` | Counter | Subscription requests by method |
//! | `woopsa_api_errors_total` | Counter | Failed requests by method and error type |
//! | `woopsa_wait_notification_duration_seconds` | Histogram | Long-poll duration |
//!
//! Each [`ApiMetrics`] owns its registry, so several servers in one process
//! (or one test binary) never collide.

use std::time::Duration;

use parking_lot::Mutex;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use woopsa_subscription::ServiceStats;

use crate::error::ApiError;

/// Long-poll duration buckets, in seconds.
const WAIT_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

// =============================================================================
// ApiMetrics
// =============================================================================

/// Registry and handles of every exported metric.
pub struct ApiMetrics {
    registry: Registry,
    channels: IntGauge,
    subscriptions: IntGauge,
    queued: IntGauge,
    lost_channels: IntGauge,
    enqueued: IntCounter,
    evicted: IntCounter,
    acknowledged: IntCounter,
    ticks: IntCounter,
    overlapping_ticks: IntCounter,
    panicked_ticks: IntCounter,
    requests: IntCounterVec,
    errors: IntCounterVec,
    wait_duration: Histogram,
    refresh: Mutex<()>,
}

impl ApiMetrics {
    /// Creates and registers every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let gauge = |name: &str, help: &str| -> Result<IntGauge, prometheus::Error> {
            let gauge = IntGauge::new(name, help)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };
        let counter_vec =
            |name: &str, help: &str, labels: &[&str]| -> Result<IntCounterVec, prometheus::Error> {
                let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
                registry.register(Box::new(counter.clone()))?;
                Ok(counter)
            };

        let channels = gauge("woopsa_channels", "Open subscription channels")?;
        let subscriptions = gauge("woopsa_subscriptions", "Subscriptions across open channels")?;
        let queued = gauge(
            "woopsa_queued_notifications",
            "Notifications waiting for a client",
        )?;
        let lost_channels = gauge(
            "woopsa_channels_notifications_lost",
            "Channels whose notifications were lost and not yet acknowledged",
        )?;
        let enqueued = counter(
            "woopsa_notifications_enqueued_total",
            "Total notifications enqueued",
        )?;
        let evicted = counter(
            "woopsa_notifications_evicted_total",
            "Total notifications evicted by full queues",
        )?;
        let acknowledged = counter(
            "woopsa_notifications_acknowledged_total",
            "Total notifications acknowledged by clients",
        )?;
        let ticks = counter("woopsa_scheduler_ticks_total", "Total timer ticks run")?;
        let overlapping_ticks = counter(
            "woopsa_scheduler_overlapping_ticks_total",
            "Total ticks skipped because the previous tick was still running",
        )?;
        let panicked_ticks = counter(
            "woopsa_scheduler_panicked_ticks_total",
            "Total ticks that panicked",
        )?;
        let requests = counter_vec(
            "woopsa_api_requests_total",
            "Total subscription service requests by method",
            &["method"],
        )?;
        let errors = counter_vec(
            "woopsa_api_errors_total",
            "Total failed subscription service requests by method and error type",
            &["method", "error_type"],
        )?;

        let wait_duration = Histogram::with_opts(
            HistogramOpts::new(
                "woopsa_wait_notification_duration_seconds",
                "Duration of WaitNotification long polls in seconds",
            )
            .buckets(WAIT_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(wait_duration.clone()))?;

        Ok(Self {
            registry,
            channels,
            subscriptions,
            queued,
            lost_channels,
            enqueued,
            evicted,
            acknowledged,
            ticks,
            overlapping_ticks,
            panicked_ticks,
            requests,
            errors,
            wait_duration,
            refresh: Mutex::new(()),
        })
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Counts a subscription request and, if it failed, its error type.
    pub fn record_request<T>(&self, method: &str, result: &Result<T, ApiError>) {
        self.requests.with_label_values(&[method]).inc();
        if let Err(e) = result {
            self.errors.with_label_values(&[method, e.wire_type()]).inc();
        }
    }

    /// Records how long a long poll held the request.
    pub fn observe_wait(&self, elapsed: Duration) {
        self.wait_duration.observe(elapsed.as_secs_f64());
    }

    /// Brings service gauges and counters up to `stats`.
    ///
    /// Counters only move forward; a snapshot below the exported value
    /// leaves the counter unchanged.
    pub fn refresh(&self, stats: &ServiceStats) {
        let _serial = self.refresh.lock();

        self.channels.set(gauge_value(stats.channels));
        self.subscriptions.set(gauge_value(stats.subscriptions));
        self.queued.set(gauge_value(stats.queued));
        self.lost_channels.set(gauge_value(stats.lost_channels));

        advance(&self.enqueued, stats.enqueued);
        advance(&self.evicted, stats.evicted);
        advance(&self.acknowledged, stats.acknowledged);
        advance(&self.ticks, stats.scheduler.ticks);
        advance(&self.overlapping_ticks, stats.scheduler.overlapping);
        advance(&self.panicked_ticks, stats.scheduler.panicked);
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Refreshes from `stats` and encodes every metric in the text format.
    pub fn render(&self, stats: &ServiceStats) -> Result<String, prometheus::Error> {
        self.refresh(stats);

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type of [`render`](Self::render) output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("channels", &self.channels.get())
            .field("subscriptions", &self.subscriptions.get())
            .finish()
    }
}

fn gauge_value(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn advance(counter: &IntCounter, total: u64) {
    let exported = counter.get();
    if total > exported {
        counter.inc_by(total - exported);
    }
}
