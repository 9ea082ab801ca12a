// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Object model collaborator traits.
//!
//! The subscription engine does not own the object tree. It reaches
//! properties through [`ObjectModel`], and remote Woopsa servers mounted
//! into that tree through [`UpstreamClient`].
//!
//! # Example
//!
//! ```rust,ignore
//! use woopsa_core::model::{Element, ObjectModel};
//!
//! match model.lookup("Line1/Speed").await? {
//!     Element::Property(value_type) => println!("property of type {}", value_type),
//!     Element::Object => println!("container"),
//!     Element::Client(_) => println!("remote server"),
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::types::{MonitorInterval, TimedValue, Value, ValueType};

/// Callback invoked with each value an upstream subscription delivers.
pub type ValueCallback = Arc<dyn Fn(TimedValue) + Send + Sync>;

// =============================================================================
// Element
// =============================================================================

/// What a path resolves to.
#[derive(Clone)]
pub enum Element {
    /// A readable property of the given type.
    Property(ValueType),
    /// A container of other elements.
    Object,
    /// A remote Woopsa server mounted at this path.
    Client(Arc<dyn UpstreamClient>),
}

impl Element {
    /// Returns `true` for properties.
    pub fn is_property(&self) -> bool {
        matches!(self, Element::Property(_))
    }

    /// Returns the mounted client, if this element is one.
    pub fn as_client(&self) -> Option<&Arc<dyn UpstreamClient>> {
        match self {
            Element::Client(client) => Some(client),
            _ => None,
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Property(t) => f.debug_tuple("Property").field(t).finish(),
            Element::Object => f.write_str("Object"),
            Element::Client(_) => f.write_str("Client"),
        }
    }
}

// =============================================================================
// ObjectModel
// =============================================================================

/// A tree of named properties served by this process.
#[async_trait]
pub trait ObjectModel: Send + Sync {
    /// The server name used in `server#path` links.
    fn name(&self) -> &str;

    /// Resolves a normalized path.
    async fn lookup(&self, path: &str) -> ModelResult<Element>;

    /// Reads a property.
    async fn read(&self, path: &str) -> ModelResult<TimedValue>;

    /// Writes a property.
    async fn write(&self, path: &str, value: Value) -> ModelResult<()> {
        let _ = value;
        Err(ModelError::not_writable(path))
    }
}

// =============================================================================
// UpstreamClient
// =============================================================================

/// Identifies a subscription held on an upstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpstreamSubscriptionId(pub u64);

impl fmt::Display for UpstreamSubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connection to another Woopsa server.
///
/// Paths are relative to the remote server's root.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Reads a remote property.
    async fn read(&self, path: &str) -> ModelResult<TimedValue>;

    /// Writes a remote property.
    async fn write(&self, path: &str, value: Value) -> ModelResult<()> {
        let _ = value;
        Err(ModelError::not_writable(path))
    }

    /// Opens a native subscription on the remote server.
    ///
    /// `callback` is invoked once per delivered notification, in order.
    async fn subscribe(
        &self,
        path: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
        callback: ValueCallback,
    ) -> ModelResult<UpstreamSubscriptionId>;

    /// Closes a native subscription. Returns `false` if it was unknown.
    async fn unsubscribe(&self, id: UpstreamSubscriptionId) -> ModelResult<bool>;
}
