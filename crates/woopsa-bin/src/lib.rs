// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # woopsa-bin
//!
//! The `woopsa` server binary.
//!
//! ```text
//!            main.rs
//!               │
//!            cli.rs
//!               │
//!     ┌─────────┼──────────┐
//!     ▼         ▼          ▼
//! commands   runtime    logging
//!               │
//!           shutdown
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Serve the model described in woopsa.yaml (default command)
//! woopsa
//!
//! # Use another configuration file
//! woopsa -c /etc/woopsa/plant.toml
//!
//! # Check a configuration file
//! woopsa validate --strict
//!
//! # Show version
//! woopsa version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands, LogFormat, OutputFormat, ValidateArgs};
pub use error::{BinError, BinResult};
pub use runtime::{RuntimeBuilder, ServerRuntime};
pub use shutdown::ShutdownCoordinator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name
pub const NAME: &str = "woopsa";
