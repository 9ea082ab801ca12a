// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory object model.
//!
//! Properties live in a flat map keyed by normalized path; objects are
//! implied by the paths beneath them. Remote servers can be mounted at a
//! path, after which everything below that path is served by the client.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::{Element, ObjectModel, UpstreamClient};
use crate::path::{normalize_path, relative_to, strict_prefixes};
use crate::types::{TimedValue, Value, ValueType};

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone)]
enum Node {
    Property { value: TimedValue, writable: bool },
    Client(Arc<dyn UpstreamClient>),
}

// =============================================================================
// MemoryModel
// =============================================================================

/// A thread-safe object model held entirely in memory.
///
/// # Examples
///
/// ```
/// use woopsa_core::memory::MemoryModel;
/// use woopsa_core::types::Value;
///
/// let model = MemoryModel::new("plant");
/// model.set("/Line1/Speed", 12.5);
/// model.set("Line1/Running", true);
///
/// assert!(model.contains("Line1/Speed"));
/// assert_eq!(model.get("Line1/Running"), Some(Value::Logical(true)));
/// assert!(model.remove("Line1"));
/// assert!(!model.contains("Line1/Speed"));
/// ```
pub struct MemoryModel {
    name: String,
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl MemoryModel {
    /// Creates an empty model with the given server name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Sets a writable property, creating it if needed.
    ///
    /// The value is stamped with the current time.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        self.define(path, value, true);
    }

    /// Sets a property and its writability.
    pub fn define(&self, path: &str, value: impl Into<Value>, writable: bool) {
        let path = normalize_path(path);
        let value = TimedValue::now(value);
        debug!(path = %path, value = %value.value, "Property set");
        self.nodes
            .write()
            .insert(path, Node::Property { value, writable });
    }

    /// Returns the current value of a local property.
    pub fn get(&self, path: &str) -> Option<Value> {
        match self.nodes.read().get(&normalize_path(path)) {
            Some(Node::Property { value, .. }) => Some(value.value.clone()),
            _ => None,
        }
    }

    /// Removes the element at `path` and everything below it.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let mut nodes = self.nodes.write();
        let before = nodes.len();
        nodes.retain(|key, _| relative_to(&path, key).is_none());
        before != nodes.len()
    }

    /// Mounts a remote server at `path`.
    pub fn mount_client(&self, path: &str, client: Arc<dyn UpstreamClient>) {
        let path = normalize_path(path);
        debug!(path = %path, "Upstream client mounted");
        self.nodes.write().insert(path, Node::Client(client));
    }

    /// Returns `true` if a local element exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let nodes = self.nodes.read();
        nodes.contains_key(&path) || Self::has_children(&nodes, &path)
    }

    /// Lists every local property and mount point.
    pub fn paths(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    fn has_children(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
        nodes
            .keys()
            .any(|key| key != path && relative_to(path, key).is_some())
    }

    /// Finds a client mounted strictly above `path`, with the path relative to it.
    fn mounted_above(&self, path: &str) -> Option<(Arc<dyn UpstreamClient>, String)> {
        let nodes = self.nodes.read();
        strict_prefixes(path).find_map(|prefix| match nodes.get(prefix) {
            Some(Node::Client(client)) => {
                relative_to(prefix, path).map(|rest| (client.clone(), rest.to_string()))
            }
            _ => None,
        })
    }
}

impl fmt::Debug for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryModel")
            .field("name", &self.name)
            .field("nodes", &self.nodes.read().len())
            .finish()
    }
}

#[async_trait]
impl ObjectModel for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, path: &str) -> ModelResult<Element> {
        let path = normalize_path(path);
        let local = {
            let nodes = self.nodes.read();
            match nodes.get(&path) {
                Some(Node::Property { value, .. }) => Some(Element::Property(value.value_type())),
                Some(Node::Client(client)) => Some(Element::Client(client.clone())),
                None if path.is_empty() || Self::has_children(&nodes, &path) => {
                    Some(Element::Object)
                }
                None => None,
            }
        };
        if let Some(element) = local {
            return Ok(element);
        }

        match self.mounted_above(&path) {
            Some((client, relative)) => {
                let value = client.read(&relative).await?;
                Ok(Element::Property(value.value_type()))
            }
            None => Err(ModelError::not_found(path)),
        }
    }

    async fn read(&self, path: &str) -> ModelResult<TimedValue> {
        let path = normalize_path(path);
        let local = self.nodes.read().get(&path).cloned();
        match local {
            Some(Node::Property { value, .. }) => Ok(value),
            Some(Node::Client(_)) => Err(ModelError::read_failed(path, "not a property")),
            None => match self.mounted_above(&path) {
                Some((client, relative)) => client.read(&relative).await,
                None if self.contains(&path) => {
                    Err(ModelError::read_failed(path, "not a property"))
                }
                None => Err(ModelError::not_found(path)),
            },
        }
    }

    async fn write(&self, path: &str, value: Value) -> ModelResult<()> {
        let path = normalize_path(path);
        {
            let mut nodes = self.nodes.write();
            if let Some(node) = nodes.get_mut(&path) {
                return match node {
                    Node::Property {
                        value: current,
                        writable,
                    } => {
                        if !*writable {
                            return Err(ModelError::not_writable(path));
                        }
                        let value = coerce(current.value_type(), value)?;
                        *current = TimedValue::new(value).with_timestamp(Utc::now());
                        debug!(path = %path, "Property written");
                        Ok(())
                    }
                    Node::Client(_) => Err(ModelError::not_writable(path)),
                };
            }
        }

        match self.mounted_above(&path) {
            Some((client, relative)) => client.write(&relative, value).await,
            None => Err(ModelError::not_found(path)),
        }
    }
}

/// Keeps a property's type stable across writes.
fn coerce(expected: ValueType, value: Value) -> ModelResult<Value> {
    let actual = value.value_type();
    if expected == actual || expected == ValueType::Null || actual == ValueType::Null {
        return Ok(value);
    }
    match (expected, value) {
        (ValueType::Real, Value::Integer(i)) => Ok(Value::Real(i as f64)),
        (expected, value) => Value::from_json(&value.to_json(), expected),
    }
}
