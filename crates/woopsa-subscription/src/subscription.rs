// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscriptions and their monitoring variants.
//!
//! A subscription watches one property path. How it watches is decided once,
//! at registration, from the kind of root it was registered against and
//! what the path resolves to:
//!
//! | Root | Upstream client above the path | Kind |
//! |---|---|---|
//! | server model | no | [`SubscriptionKind::MonitorServer`] |
//! | server model | yes | [`SubscriptionKind::ServerSubClient`] |
//! | client | n/a | [`SubscriptionKind::MonitorClient`] |
//!
//! The two monitor kinds poll: a monitor timer samples the value and stages
//! changes, a publish timer flushes staged changes to the channel. The
//! sub-client kind opens a native subscription on the upstream server and
//! forwards what it receives, so chained servers do not poll twice.
//!
//! Read failures during polling are logged and skipped; the next tick tries
//! again. A property that stops resolving is reported once as a null value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use woopsa_core::error::{ModelError, ModelResult, SubscriptionError, SubscriptionResult};
use woopsa_core::hooks::{ModelAccessGuard, ModelAccessHooks};
use woopsa_core::model::{
    Element, ObjectModel, UpstreamClient, UpstreamSubscriptionId, ValueCallback,
};
use woopsa_core::path::{normalize_path, relative_to, strict_prefixes};
use woopsa_core::types::{MonitorInterval, SubscriptionId, TimedValue, Value};

use crate::scheduler::{Scheduler, TimerHandle};

// =============================================================================
// Roots and kinds
// =============================================================================

/// What a channel registers subscriptions against.
#[derive(Clone)]
pub enum SubscriptionRoot {
    /// An object model served by this process.
    Server(Arc<dyn ObjectModel>),
    /// A client bound to a remote server, mirrored locally.
    Client(Arc<dyn UpstreamClient>),
}

impl SubscriptionRoot {
    /// Returns `true` for a server-side root.
    pub fn is_server_side(&self) -> bool {
        matches!(self, SubscriptionRoot::Server(_))
    }
}

impl fmt::Debug for SubscriptionRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionRoot::Server(model) => {
                f.debug_tuple("Server").field(&model.name()).finish()
            }
            SubscriptionRoot::Client(_) => f.write_str("Client"),
        }
    }
}

/// How a subscription monitors its property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Polls a property of the local model.
    MonitorServer,
    /// Polls a property through a client root.
    MonitorClient,
    /// Forwards a native subscription held on an upstream client.
    ServerSubClient,
}

impl SubscriptionKind {
    /// Picks the variant for a root kind and whether an upstream client was
    /// found along the path.
    pub fn select(is_server_side: bool, upstream_found: bool) -> Self {
        match (is_server_side, upstream_found) {
            (true, false) => SubscriptionKind::MonitorServer,
            (true, true) => SubscriptionKind::ServerSubClient,
            (false, _) => SubscriptionKind::MonitorClient,
        }
    }

    /// Returns `true` for the polling variants.
    pub fn is_polling(&self) -> bool {
        !matches!(self, SubscriptionKind::ServerSubClient)
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionKind::MonitorServer => "monitor_server",
            SubscriptionKind::MonitorClient => "monitor_client",
            SubscriptionKind::ServerSubClient => "server_sub_client",
        };
        f.write_str(name)
    }
}

// =============================================================================
// NotificationSink
// =============================================================================

/// Receives detected changes. Implemented by the owning channel.
pub trait NotificationSink: Send + Sync {
    /// Queues `values` for `subscription_id`, in order.
    fn publish(
        &self,
        subscription_id: SubscriptionId,
        monitor_interval: MonitorInterval,
        values: Vec<TimedValue>,
    );
}

// =============================================================================
// Resolution
// =============================================================================

#[derive(Clone)]
enum Source {
    Server(Arc<dyn ObjectModel>),
    Client(Arc<dyn UpstreamClient>),
}

impl Source {
    async fn read(&self, path: &str) -> ModelResult<TimedValue> {
        match self {
            Source::Server(model) => model.read(path).await,
            Source::Client(client) => client.read(path).await,
        }
    }
}

/// A path resolved against a root, ready to become a subscription.
pub struct Resolved {
    kind: SubscriptionKind,
    source: Source,
    source_path: String,
}

impl Resolved {
    /// The selected variant.
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("kind", &self.kind)
            .field("source_path", &self.source_path)
            .finish()
    }
}

/// Resolves `path` against `root` and selects the subscription variant.
///
/// Fails with `NotFound` if the path does not name a property.
pub async fn resolve(
    root: &SubscriptionRoot,
    path: &str,
    hooks: &Arc<dyn ModelAccessHooks>,
) -> SubscriptionResult<Resolved> {
    let path = normalize_path(path);

    match root {
        SubscriptionRoot::Server(model) => {
            if let Some((client, relative)) = find_client_along_path(model, &path, hooks).await {
                return Ok(Resolved {
                    kind: SubscriptionKind::select(true, true),
                    source: Source::Client(client),
                    source_path: relative,
                });
            }

            let element = {
                let _access = ModelAccessGuard::enter(hooks.clone(), path.as_str());
                model.lookup(&path).await
            };
            match element {
                Ok(Element::Property(_)) => Ok(Resolved {
                    kind: SubscriptionKind::select(true, false),
                    source: Source::Server(model.clone()),
                    source_path: path,
                }),
                Ok(_) => Err(SubscriptionError::not_found(path)),
                Err(e) => {
                    debug!(path = %path, error = %e, "Lookup failed; treating path as not found");
                    Err(SubscriptionError::not_found(path))
                }
            }
        }
        SubscriptionRoot::Client(client) => match client.read(&path).await {
            Err(ModelError::NotFound { .. }) => Err(SubscriptionError::not_found(path)),
            Ok(_) | Err(_) => Ok(Resolved {
                kind: SubscriptionKind::select(false, false),
                source: Source::Client(client.clone()),
                source_path: path,
            }),
        },
    }
}

/// Finds the upstream client mounted at the longest strict prefix of `path`.
///
/// Returns the client and the path relative to it. Lookup failures count as
/// "no client at this prefix".
pub async fn find_client_along_path(
    model: &Arc<dyn ObjectModel>,
    path: &str,
    hooks: &Arc<dyn ModelAccessHooks>,
) -> Option<(Arc<dyn UpstreamClient>, String)> {
    for prefix in strict_prefixes(path) {
        let element = {
            let _access = ModelAccessGuard::enter(hooks.clone(), prefix);
            model.lookup(prefix).await
        };
        match element {
            Ok(Element::Client(client)) => {
                let relative = relative_to(prefix, path)?.to_string();
                debug!(path = %path, prefix = %prefix, "Upstream client found along path");
                return Some((client, relative));
            }
            Ok(_) => {}
            Err(e) => debug!(path = %path, prefix = %prefix, error = %e, "Prefix lookup failed"),
        }
    }
    None
}

// =============================================================================
// Subscription
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Observed {
    Value(Value),
    Missing,
}

#[derive(Default)]
struct PollState {
    last: Option<Observed>,
    staged: Vec<TimedValue>,
    failing: bool,
}

/// One watched property of a channel.
pub struct Subscription {
    id: SubscriptionId,
    path: String,
    kind: SubscriptionKind,
    monitor_interval: MonitorInterval,
    publish_interval: Duration,
    source: Source,
    source_path: String,
    sink: Weak<dyn NotificationSink>,
    hooks: Arc<dyn ModelAccessHooks>,
    poll: Mutex<PollState>,
    timers: Mutex<Vec<TimerHandle>>,
    upstream: Mutex<Option<(Arc<dyn UpstreamClient>, UpstreamSubscriptionId)>>,
    disposed: AtomicBool,
}

impl Subscription {
    /// Creates a subscription from a resolved path. Monitoring begins with
    /// [`Subscription::start`].
    pub fn new(
        id: SubscriptionId,
        path: &str,
        resolved: Resolved,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
        sink: Weak<dyn NotificationSink>,
        hooks: Arc<dyn ModelAccessHooks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            path: normalize_path(path),
            kind: resolved.kind,
            monitor_interval,
            publish_interval,
            source: resolved.source,
            source_path: resolved.source_path,
            sink,
            hooks,
            poll: Mutex::new(PollState::default()),
            timers: Mutex::new(Vec::new()),
            upstream: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Subscription id within its channel.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Normalized property path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Monitoring variant.
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    /// Sampling interval.
    pub fn monitor_interval(&self) -> MonitorInterval {
        self.monitor_interval
    }

    /// Flush interval.
    pub fn publish_interval(&self) -> Duration {
        self.publish_interval
    }

    /// Returns `true` once disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Starts monitoring.
    ///
    /// Polling variants schedule their monitor and publish timers. The
    /// sub-client variant opens its upstream subscription, which can fail.
    pub async fn start(self: &Arc<Self>, scheduler: &Scheduler) -> SubscriptionResult<()> {
        match self.kind {
            SubscriptionKind::MonitorServer | SubscriptionKind::MonitorClient => {
                self.start_polling(scheduler);
                Ok(())
            }
            SubscriptionKind::ServerSubClient => self.start_upstream().await,
        }
    }

    fn start_polling(self: &Arc<Self>, scheduler: &Scheduler) {
        let sampling = self.monitor_interval.sampling_period(self.publish_interval);

        let weak = Arc::downgrade(self);
        let monitor = scheduler.schedule_repeating(sampling, move || {
            let weak = weak.clone();
            async move {
                if let Some(subscription) = weak.upgrade() {
                    subscription.monitor_tick().await;
                }
            }
        });

        let weak = Arc::downgrade(self);
        let publish = scheduler.schedule_repeating(self.publish_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(subscription) = weak.upgrade() {
                    subscription.publish_tick();
                }
            }
        });

        let mut timers = self.timers.lock();
        if self.is_disposed() {
            // disposed while starting; dropping the handles cancels both timers
            return;
        }
        timers.push(monitor);
        timers.push(publish);
        debug!(
            subscription_id = %self.id,
            path = %self.path,
            kind = %self.kind,
            monitor = %self.monitor_interval,
            publish_ms = self.publish_interval.as_millis() as u64,
            "Polling started"
        );
    }

    async fn start_upstream(self: &Arc<Self>) -> SubscriptionResult<()> {
        let Source::Client(client) = &self.source else {
            return Err(SubscriptionError::upstream("sub-client subscription without a client"));
        };

        let sink = self.sink.clone();
        let id = self.id;
        let monitor_interval = self.monitor_interval;
        let callback: ValueCallback = Arc::new(move |value: TimedValue| {
            if let Some(sink) = sink.upgrade() {
                sink.publish(id, monitor_interval, vec![value]);
            }
        });

        let upstream_id = client
            .subscribe(
                &self.source_path,
                self.monitor_interval,
                self.publish_interval,
                callback,
            )
            .await
            .map_err(SubscriptionError::from)?;

        debug!(
            subscription_id = %self.id,
            path = %self.path,
            upstream_id = %upstream_id,
            "Upstream subscription opened"
        );

        if self.is_disposed() {
            // disposed while subscribing upstream
            let _ = client.unsubscribe(upstream_id).await;
        } else {
            *self.upstream.lock() = Some((client.clone(), upstream_id));
        }
        Ok(())
    }

    /// Samples the property and stages a change.
    async fn monitor_tick(&self) {
        if self.is_disposed() {
            return;
        }

        let result = match &self.source {
            Source::Server(_) => {
                let _access = ModelAccessGuard::enter(self.hooks.clone(), self.source_path.as_str());
                self.source.read(&self.source_path).await
            }
            Source::Client(_) => self.source.read(&self.source_path).await,
        };

        let (observed, timed) = match result {
            Ok(value) => (Observed::Value(value.value.clone()), value),
            Err(ModelError::NotFound { .. }) => (Observed::Missing, TimedValue::now(Value::Null)),
            Err(e) => {
                let mut poll = self.poll.lock();
                if poll.failing {
                    debug!(subscription_id = %self.id, path = %self.path, error = %e, "Poll failed");
                } else {
                    warn!(subscription_id = %self.id, path = %self.path, error = %e, "Poll failed");
                    poll.failing = true;
                }
                return;
            }
        };

        let mut poll = self.poll.lock();
        poll.failing = false;
        if poll.last.as_ref() == Some(&observed) {
            return;
        }
        if observed == Observed::Missing {
            debug!(subscription_id = %self.id, path = %self.path, "Property no longer resolves");
        }
        poll.last = Some(observed);
        if self.monitor_interval.is_last_published_value_only() {
            poll.staged.clear();
        }
        poll.staged.push(timed);
    }

    /// Flushes staged changes to the channel.
    fn publish_tick(&self) {
        if self.is_disposed() {
            return;
        }
        let staged = std::mem::take(&mut self.poll.lock().staged);
        if staged.is_empty() {
            return;
        }
        if let Some(sink) = self.sink.upgrade() {
            sink.publish(self.id, self.monitor_interval, staged);
        }
    }

    /// Stops monitoring and releases the upstream subscription, if any.
    ///
    /// Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.timers.lock().clear();
        self.poll.lock().staged.clear();

        let upstream = self.upstream.lock().take();
        if let Some((client, upstream_id)) = upstream {
            match client.unsubscribe(upstream_id).await {
                Ok(_) => debug!(subscription_id = %self.id, upstream_id = %upstream_id, "Upstream subscription closed"),
                Err(e) => warn!(
                    subscription_id = %self.id,
                    upstream_id = %upstream_id,
                    error = %e,
                    "Failed to close upstream subscription"
                ),
            }
        }
        debug!(subscription_id = %self.id, path = %self.path, "Subscription disposed");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("monitor_interval", &self.monitor_interval)
            .field("publish_interval", &self.publish_interval)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
