// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Woopsa HTTP protocol names.
//!
//! Shared by the server routes and the HTTP client so both sides agree on
//! verbs, method names, form parameters and the error body.

use serde::{Deserialize, Serialize};

/// Default URL prefix of a Woopsa server.
pub const DEFAULT_BASE_PATH: &str = "/woopsa";

/// Verb for reading a property.
pub const VERB_READ: &str = "read";

/// Verb for writing a property.
pub const VERB_WRITE: &str = "write";

/// Verb for invoking a method.
pub const VERB_INVOKE: &str = "invoke";

/// Object exposing the subscription methods.
pub const SUBSCRIPTION_SERVICE: &str = "SubscriptionService";

/// Subscription service method names.
pub mod method {
    /// Opens a channel.
    pub const CREATE_SUBSCRIPTION_CHANNEL: &str = "CreateSubscriptionChannel";
    /// Registers a subscription.
    pub const REGISTER_SUBSCRIPTION: &str = "RegisterSubscription";
    /// Unregisters a subscription.
    pub const UNREGISTER_SUBSCRIPTION: &str = "UnregisterSubscription";
    /// Long-polls a channel.
    pub const WAIT_NOTIFICATION: &str = "WaitNotification";
}

/// Form parameter names.
pub mod param {
    /// Queue size of a new channel.
    pub const NOTIFICATION_QUEUE_SIZE: &str = "NotificationQueueSize";
    /// Channel id.
    pub const SUBSCRIPTION_CHANNEL: &str = "SubscriptionChannel";
    /// Property path or `server#path` link.
    pub const PROPERTY_LINK: &str = "PropertyLink";
    /// Monitor interval in seconds; negative for last-value-only.
    pub const MONITOR_INTERVAL: &str = "MonitorInterval";
    /// Publish interval in seconds.
    pub const PUBLISH_INTERVAL: &str = "PublishInterval";
    /// Subscription id.
    pub const SUBSCRIPTION_ID: &str = "SubscriptionId";
    /// Last notification id received, or 0.
    pub const LAST_NOTIFICATION_ID: &str = "LastNotificationId";
    /// Value to write.
    pub const VALUE: &str = "Value";
}

/// Body of a failed request.
///
/// ```
/// use woopsa_core::protocol::ErrorBody;
///
/// let body = ErrorBody::new("WoopsaNotFoundException", "Path not found: Votes");
/// let json = serde_json::to_value(&body).unwrap();
/// assert_eq!(json["Error"], true);
/// assert_eq!(json["Type"], "WoopsaNotFoundException");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `true`.
    #[serde(rename = "Error")]
    pub error: bool,
    /// Human-readable message.
    #[serde(rename = "Message")]
    pub message: String,
    /// Exception name.
    #[serde(rename = "Type")]
    pub error_type: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            error_type: error_type.into(),
        }
    }
}
