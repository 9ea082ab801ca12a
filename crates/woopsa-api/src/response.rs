// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Response bodies.

use axum::Json;
use serde::{Deserialize, Serialize};

use woopsa_core::types::{Notification, TimedValue, Value};

/// A Woopsa value body: `{"Value": .., "Type": ..}`.
pub fn woopsa_value(value: impl Into<Value>) -> Json<TimedValue> {
    Json(TimedValue::new(value))
}

/// The body of a `WaitNotification` response.
pub fn notification_list(notifications: &[Notification]) -> Json<TimedValue> {
    let json = serde_json::to_value(notifications).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()));
    woopsa_value(Value::JsonData(json))
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Open subscription channels.
    pub channels: usize,
    /// Server version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

impl HealthResponse {
    /// Creates a healthy response.
    pub fn healthy(channels: usize, uptime_seconds: u64) -> Self {
        Self {
            status: "ok".to_string(),
            channels,
            version: crate::VERSION.to_string(),
            uptime_seconds,
        }
    }
}
