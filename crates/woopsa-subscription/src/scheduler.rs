// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared timer scheduler.
//!
//! Every polling subscription needs two recurring timers (monitor and
//! publish). Rather than one task per timer, a single coordinator task keeps
//! all deadlines in a min-heap and dispatches due ticks onto the runtime,
//! with a semaphore capping how many ticks run at once.
//!
//! # Tick semantics
//!
//! - The first tick fires one interval after scheduling.
//! - A tick is skipped while the previous tick of the same timer is still
//!   running, so a slow read never overlaps itself.
//! - Missed deadlines are not replayed; the timer resumes one interval
//!   after the late tick.
//! - A panicking tick is caught and logged; the timer keeps running.
//! - Dropping or cancelling the [`TimerHandle`] stops the timer.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Shortest interval a timer may have.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

// =============================================================================
// Timer entries
// =============================================================================

struct TimerEntry {
    id: u64,
    deadline: Instant,
    interval: Duration,
    tick: TickFn,
    cancelled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    // BinaryHeap is a max-heap; reverse for earliest deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

enum Command {
    Schedule(TimerEntry),
    Shutdown,
}

// =============================================================================
// TimerHandle
// =============================================================================

/// Cancels its timer when dropped.
#[must_use = "the timer is cancelled when the handle is dropped"]
pub struct TimerHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// The timer id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops the timer. A tick already running completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once the timer is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Timers scheduled since creation.
    pub scheduled: u64,
    /// Ticks dispatched.
    pub ticks: u64,
    /// Ticks skipped because the previous tick was still running.
    pub overlapping: u64,
    /// Ticks that panicked.
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct SchedulerStatsInner {
    scheduled: AtomicU64,
    ticks: AtomicU64,
    overlapping: AtomicU64,
    panicked: AtomicU64,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Drives recurring ticks for many timers from one coordinator task.
///
/// Must be created inside a tokio runtime.
pub struct Scheduler {
    command_tx: mpsc::UnboundedSender<Command>,
    next_id: AtomicU64,
    stats: Arc<SchedulerStatsInner>,
    workers: usize,
}

impl Scheduler {
    /// Starts a scheduler running at most `workers` ticks concurrently.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SchedulerStatsInner::default());

        tokio::spawn(coordinator_loop(
            command_rx,
            Arc::new(Semaphore::new(workers)),
            stats.clone(),
        ));
        debug!(workers, "Scheduler started");

        Self {
            command_tx,
            next_id: AtomicU64::new(1),
            stats,
            workers,
        }
    }

    /// Runs `tick` every `interval` until the returned handle is dropped.
    pub fn schedule_repeating<F, Fut>(&self, interval: Duration, tick: F) -> TimerHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let interval = interval.max(MIN_INTERVAL);
        let cancelled = Arc::new(AtomicBool::new(false));

        let entry = TimerEntry {
            id,
            deadline: Instant::now() + interval,
            interval,
            tick: Arc::new(move || tick().boxed()),
            cancelled: cancelled.clone(),
            running: Arc::new(AtomicBool::new(false)),
        };

        if self.command_tx.send(Command::Schedule(entry)).is_err() {
            // coordinator gone; hand back an already-cancelled timer
            cancelled.store(true, Ordering::Release);
        } else {
            self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
        }

        TimerHandle { id, cancelled }
    }

    /// Stops the coordinator. Outstanding timers never fire again.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }

    /// Maximum concurrent ticks.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            scheduled: self.stats.scheduled.load(Ordering::Relaxed),
            ticks: self.stats.ticks.load(Ordering::Relaxed),
            overlapping: self.stats.overlapping.load(Ordering::Relaxed),
            panicked: self.stats.panicked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers)
            .field("stats", &self.stats())
            .finish()
    }
}

async fn coordinator_loop(
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    semaphore: Arc<Semaphore>,
    stats: Arc<SchedulerStatsInner>,
) {
    let mut heap: BinaryHeap<TimerEntry> = BinaryHeap::new();

    loop {
        let next_deadline = heap.peek().map(|entry| entry.deadline);
        let sleep = async move {
            match next_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::Schedule(entry)) => heap.push(entry),
                Some(Command::Shutdown) | None => break,
            },
            _ = sleep => fire_due(&mut heap, &semaphore, &stats),
        }
    }

    debug!(pending = heap.len(), "Scheduler stopped");
}

fn fire_due(
    heap: &mut BinaryHeap<TimerEntry>,
    semaphore: &Arc<Semaphore>,
    stats: &Arc<SchedulerStatsInner>,
) {
    let now = Instant::now();

    while heap.peek().is_some_and(|entry| entry.deadline <= now) {
        let Some(mut entry) = heap.pop() else { break };
        if entry.cancelled.load(Ordering::Acquire) {
            trace!(timer_id = entry.id, "Timer dropped");
            continue;
        }

        if entry.running.swap(true, Ordering::AcqRel) {
            stats.overlapping.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.ticks.fetch_add(1, Ordering::Relaxed);
            let tick = entry.tick.clone();
            let running = entry.running.clone();
            let cancelled = entry.cancelled.clone();
            let semaphore = semaphore.clone();
            let timer_id = entry.id;
            let stats = stats.clone();
            tokio::spawn(async move {
                if let Ok(_permit) = semaphore.acquire_owned().await {
                    if !cancelled.load(Ordering::Acquire)
                        && AssertUnwindSafe(tick()).catch_unwind().await.is_err()
                    {
                        stats.panicked.fetch_add(1, Ordering::Relaxed);
                        warn!(timer_id, "Timer tick panicked; timer keeps running");
                    }
                }
                running.store(false, Ordering::Release);
            });
        }

        entry.deadline += entry.interval;
        if entry.deadline <= now {
            entry.deadline = now + entry.interval;
        }
        heap.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_repeating_timer_fires_each_interval() {
        let scheduler = Scheduler::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _handle = scheduler.schedule_repeating(Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        let fired = count.load(Ordering::SeqCst);
        assert!((4..=6).contains(&fired), "fired {} times", fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_timer() {
        let scheduler = Scheduler::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = scheduler.schedule_repeating(Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(25)).await;
        drop(handle);
        let at_drop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_does_not_overlap() {
        let scheduler = Scheduler::new(4);
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let (a, m) = (active.clone(), max_active.clone());
        let _handle = scheduler.schedule_repeating(Duration::from_millis(5), move || {
            let (a, m) = (a.clone(), m.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(scheduler.stats().overlapping > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_keeps_timer_alive() {
        let scheduler = Scheduler::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _handle = scheduler.schedule_repeating(Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("getter raised");
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 15, "fired {} times", fired);

        let stats = scheduler.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.overlapping, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_timers() {
        let scheduler = Scheduler::new(1);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _handle = scheduler.schedule_repeating(Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
