// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # woopsa-client
//!
//! Client side of the Woopsa subscription protocol.
//!
//! - [`SubscriptionTransport`]: the four subscription operations plus
//!   property read/write, over HTTP ([`HttpTransport`]) or in process
//!   ([`LocalTransport`])
//! - [`ClientSubscriptionChannel`]: long-polls one server channel and
//!   recovers from server restarts, reaped channels and lost notifications
//!   without the subscriber noticing
//! - [`WoopsaClient`]: a remote server as an [`UpstreamClient`], so it can be
//!   mounted into another server's object model
//!
//! ## Example
//!
//! ```rust,ignore
//! use woopsa_client::WoopsaClient;
//!
//! let client = WoopsaClient::new("http://plant:8080/woopsa")?;
//! let id = client
//!     .subscribe("Line1/Speed", MonitorInterval::Every(ms(100)), ms(200), callback)
//!     .await?;
//! ```
//!
//! [`UpstreamClient`]: woopsa_core::model::UpstreamClient

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod client;
pub mod error;
pub mod retry;
pub mod transport;

pub use channel::{ClientChannelSettings, ClientChannelStats, ClientSubscriptionChannel, ClientSubscriptionId};
pub use client::WoopsaClient;
pub use error::{ClientError, ClientResult};
pub use retry::{ExponentialBackoff, FixedDelay, RetryPolicy};
pub use transport::{HttpTransport, LocalTransport, SubscriptionTransport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
