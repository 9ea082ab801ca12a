// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Model access hooks.
//!
//! The engine reads the object model from many scheduler workers at once.
//! A model that is not thread-safe can register hooks that are told when
//! each access begins and ends, and serialize accesses itself.
//!
//! Every `before_access` is matched by exactly one `after_access`, also when
//! the access fails or its future is dropped: callers hold a
//! [`ModelAccessGuard`] for the duration of the access.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use woopsa_core::hooks::{AccessStatistics, ModelAccessGuard, ModelAccessHooks};
//!
//! let stats = Arc::new(AccessStatistics::new());
//! {
//!     let _guard = ModelAccessGuard::enter(stats.clone(), "Votes");
//!     assert_eq!(stats.in_flight(), 1);
//! }
//! assert_eq!(stats.in_flight(), 0);
//! assert_eq!(stats.total(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

// =============================================================================
// Hook trait
// =============================================================================

/// Receives begin/end notifications around object model accesses.
pub trait ModelAccessHooks: Send + Sync {
    /// Called before the model is accessed at `path`.
    fn before_access(&self, path: &str);

    /// Called after the access at `path` finished, successfully or not.
    fn after_access(&self, path: &str);
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpModelAccessHooks;

impl ModelAccessHooks for NoOpModelAccessHooks {
    fn before_access(&self, _path: &str) {}
    fn after_access(&self, _path: &str) {}
}

// =============================================================================
// AccessStatistics
// =============================================================================

/// Hooks that count accesses.
#[derive(Debug, Default)]
pub struct AccessStatistics {
    in_flight: AtomicU64,
    total: AtomicU64,
}

impl AccessStatistics {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accesses currently in progress.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Accesses started since creation.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ModelAccessHooks for AccessStatistics {
    fn before_access(&self, _path: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    fn after_access(&self, _path: &str) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

// =============================================================================
// HookChain
// =============================================================================

/// Fans hook calls out to several hooks in registration order.
///
/// `after_access` runs in reverse order so nested hooks unwind properly.
#[derive(Default)]
pub struct HookChain {
    hooks: RwLock<Vec<Arc<dyn ModelAccessHooks>>>,
}

impl HookChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook.
    pub fn push(&self, hook: Arc<dyn ModelAccessHooks>) {
        self.hooks.write().push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Returns `true` if no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }
}

impl ModelAccessHooks for HookChain {
    fn before_access(&self, path: &str) {
        for hook in self.hooks.read().iter() {
            hook.before_access(path);
        }
    }

    fn after_access(&self, path: &str) {
        for hook in self.hooks.read().iter().rev() {
            hook.after_access(path);
        }
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain").field("len", &self.len()).finish()
    }
}

// =============================================================================
// ModelAccessGuard
// =============================================================================

/// Brackets one model access; `after_access` fires on drop.
#[must_use = "the access ends when the guard is dropped"]
pub struct ModelAccessGuard {
    hooks: Arc<dyn ModelAccessHooks>,
    path: String,
}

impl ModelAccessGuard {
    /// Fires `before_access` and returns the guard.
    pub fn enter(hooks: Arc<dyn ModelAccessHooks>, path: impl Into<String>) -> Self {
        let path = path.into();
        hooks.before_access(&path);
        Self { hooks, path }
    }
}

impl Drop for ModelAccessGuard {
    fn drop(&mut self) {
        self.hooks.after_access(&self.path);
    }
}

impl fmt::Debug for ModelAccessGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAccessGuard").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        tag: &'static str,
    }

    impl ModelAccessHooks for Recorder {
        fn before_access(&self, path: &str) {
            self.events.lock().push(format!("{}+{}", self.tag, path));
        }
        fn after_access(&self, path: &str) {
            self.events.lock().push(format!("{}-{}", self.tag, path));
        }
    }

    #[test]
    fn test_guard_ends_access_on_early_return() {
        let stats = Arc::new(AccessStatistics::new());

        fn failing(stats: Arc<AccessStatistics>) -> Result<(), &'static str> {
            let _guard = ModelAccessGuard::enter(stats, "a/b");
            Err("boom")
        }

        assert!(failing(stats.clone()).is_err());
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.total(), 1);
    }

    #[test]
    fn test_chain_unwinds_in_reverse() {
        let first = Arc::new(Recorder {
            tag: "1",
            ..Default::default()
        });
        let chain = Arc::new(HookChain::new());
        chain.push(first.clone());
        chain.push(Arc::new(NoOpModelAccessHooks));
        assert_eq!(chain.len(), 2);

        drop(ModelAccessGuard::enter(chain, "x"));
        assert_eq!(*first.events.lock(), vec!["1+x".to_string(), "1-x".to_string()]);
    }
}
