// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # woopsa-core
//!
//! Core abstractions and shared types for the Woopsa subscription engine.
//!
//! This crate provides the foundational types and traits used across all
//! Woopsa components:
//!
//! - **Types**: `Value`, `ValueType`, `TimedValue`, `Notification` and the
//!   channel/subscription/notification identifiers
//! - **Path**: Property path normalization and `server#path` links
//! - **Protocol**: HTTP verbs, method and parameter names, error bodies
//! - **Error**: Unified error hierarchy
//! - **Model**: The object-model collaborator traits (`ObjectModel`,
//!   `UpstreamClient`) the engine reads values through
//! - **Hooks**: Model access begin/end notifications
//! - **Memory**: An in-memory object model
//!
//! ## Example
//!
//! ```
//! use woopsa_core::memory::MemoryModel;
//! use woopsa_core::types::Value;
//!
//! let model = MemoryModel::new("server");
//! model.set("Votes", Value::Integer(3));
//! assert!(model.contains("Votes"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod path;
pub mod protocol;
pub mod types;

// =============================================================================
// Object Model Modules
// =============================================================================

pub mod hooks;
pub mod memory;
pub mod model;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use types::*;

pub use hooks::{
    AccessStatistics, HookChain, ModelAccessGuard, ModelAccessHooks, NoOpModelAccessHooks,
};
pub use memory::MemoryModel;
pub use model::{Element, ObjectModel, UpstreamClient, UpstreamSubscriptionId, ValueCallback};
pub use path::{normalize_path, PropertyLink};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
