// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Woopsa Integration Tests
//!
//! Cross-crate tests for the Woopsa workspace plus the helpers they share.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p woopsa-tests
//! cargo test -p woopsa-tests --test integration_queue
//! cargo test -p woopsa-tests --test integration_service
//! cargo test -p woopsa-tests --test integration_client
//! cargo test -p woopsa-tests --test integration_api
//! ```
//!
//! ## Test Suites
//!
//! - `integration_queue.rs`: id wraparound, bounded eviction, coalescing,
//!   acknowledgement pruning
//! - `integration_service.rs`: end-to-end channel scenarios, unregister
//!   purging, many concurrent subscriptions, chained servers
//! - `integration_client.rs`: client channel recovery from restarts,
//!   transport failures and lost notifications
//! - `integration_api.rs`: the HTTP surface and configuration loading
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use woopsa_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = ServiceHarness::new();
//!     harness.model.set("Votes", 0);
//!     let channel = harness.service.create_channel(10);
//!     // ...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
