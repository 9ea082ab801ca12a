// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for Woopsa.
//!
//! Values travel on the wire as `{"Value": .., "Type": .., "TimeStamp": ..}`
//! objects and notifications as `{"Id", "SubscriptionId", "Value"}` records.
//! The types in this module own that mapping so the engine and the
//! transports never handle raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from its raw value.
            #[inline]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw value.
            #[inline]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id! {
    /// Identifies a subscription channel within one service.
    ///
    /// Channel ids start at a random point so that a restarted server does
    /// not hand out ids a still-connected client remembers.
    ChannelId
}

numeric_id! {
    /// Identifies a subscription within one channel.
    SubscriptionId
}

numeric_id! {
    /// Identifies a notification within one channel.
    ///
    /// The value `0` is never assigned. Clients send it to acknowledge
    /// lost notifications or to start from scratch.
    ///
    /// # Examples
    ///
    /// ```
    /// use woopsa_core::types::NotificationId;
    ///
    /// assert!(NotificationId::RESET.is_reset());
    /// assert!(!NotificationId::new(12).is_reset());
    /// ```
    NotificationId
}

impl NotificationId {
    /// The reset/acknowledge sentinel.
    pub const RESET: NotificationId = NotificationId(0);

    /// Returns `true` for the reset sentinel.
    #[inline]
    pub const fn is_reset(self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// ValueType
// =============================================================================

/// The Woopsa type tag carried next to every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// No value.
    Null,
    /// Boolean.
    Logical,
    /// Signed integer.
    Integer,
    /// Floating point.
    Real,
    /// Point in time (RFC 3339 on the wire).
    DateTime,
    /// Duration in seconds.
    TimeSpan,
    /// Text.
    Text,
    /// A link to another Woopsa element.
    WoopsaLink,
    /// Arbitrary JSON.
    JsonData,
    /// A URL to a resource.
    ResourceUrl,
}

impl ValueType {
    /// Returns the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "Null",
            ValueType::Logical => "Logical",
            ValueType::Integer => "Integer",
            ValueType::Real => "Real",
            ValueType::DateTime => "DateTime",
            ValueType::TimeSpan => "TimeSpan",
            ValueType::Text => "Text",
            ValueType::WoopsaLink => "WoopsaLink",
            ValueType::JsonData => "JsonData",
            ValueType::ResourceUrl => "ResourceUrl",
        }
    }

    /// Parses a wire type name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        const ALL: [ValueType; 10] = [
            ValueType::Null,
            ValueType::Logical,
            ValueType::Integer,
            ValueType::Real,
            ValueType::DateTime,
            ValueType::TimeSpan,
            ValueType::Text,
            ValueType::WoopsaLink,
            ValueType::JsonData,
            ValueType::ResourceUrl,
        ];
        ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Value
// =============================================================================

/// A property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Logical(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point.
    Real(f64),
    /// Point in time.
    DateTime(DateTime<Utc>),
    /// Duration in seconds.
    TimeSpan(f64),
    /// Text.
    Text(String),
    /// Link to another element.
    WoopsaLink(String),
    /// Arbitrary JSON.
    JsonData(serde_json::Value),
    /// Resource URL.
    ResourceUrl(String),
}

impl Value {
    /// Returns the type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Logical(_) => ValueType::Logical,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::DateTime(_) => ValueType::DateTime,
            Value::TimeSpan(_) => ValueType::TimeSpan,
            Value::Text(_) => ValueType::Text,
            Value::WoopsaLink(_) => ValueType::WoopsaLink,
            Value::JsonData(_) => ValueType::JsonData,
            Value::ResourceUrl(_) => ValueType::ResourceUrl,
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts this value into its JSON wire form (without the type tag).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Logical(v) => Json::Bool(*v),
            Value::Integer(v) => Json::from(*v),
            Value::Real(v) | Value::TimeSpan(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::DateTime(v) => Json::String(v.to_rfc3339()),
            Value::Text(v) | Value::WoopsaLink(v) | Value::ResourceUrl(v) => Json::String(v.clone()),
            Value::JsonData(v) => v.clone(),
        }
    }

    /// Decodes a JSON value of the given type.
    ///
    /// Numbers and booleans sent as strings (as HTML forms do) are accepted.
    pub fn from_json(json: &serde_json::Value, value_type: ValueType) -> ModelResult<Self> {
        use serde_json::Value as Json;

        let mismatch = || ModelError::type_mismatch(value_type.as_str(), json_kind(json));

        let value = match value_type {
            ValueType::Null => Value::Null,
            ValueType::Logical => match json {
                Json::Bool(v) => Value::Logical(*v),
                Json::String(s) => Value::Logical(s.trim().parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            ValueType::Integer => match json {
                Json::Number(n) => Value::Integer(n.as_i64().ok_or_else(mismatch)?),
                Json::String(s) => Value::Integer(s.trim().parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            ValueType::Real | ValueType::TimeSpan => {
                let v = match json {
                    Json::Number(n) => n.as_f64().ok_or_else(mismatch)?,
                    Json::String(s) => s.trim().parse().map_err(|_| mismatch())?,
                    _ => return Err(mismatch()),
                };
                if value_type == ValueType::Real {
                    Value::Real(v)
                } else {
                    Value::TimeSpan(v)
                }
            }
            ValueType::DateTime => match json {
                Json::String(s) => Value::DateTime(
                    DateTime::parse_from_rfc3339(s)
                        .map_err(|_| mismatch())?
                        .with_timezone(&Utc),
                ),
                _ => return Err(mismatch()),
            },
            ValueType::Text => match json {
                Json::String(s) => Value::Text(s.clone()),
                Json::Null => return Err(mismatch()),
                other => Value::Text(other.to_string()),
            },
            ValueType::WoopsaLink => match json {
                Json::String(s) => Value::WoopsaLink(s.clone()),
                _ => return Err(mismatch()),
            },
            ValueType::ResourceUrl => match json {
                Json::String(s) => Value::ResourceUrl(s.clone()),
                _ => return Err(mismatch()),
            },
            ValueType::JsonData => match json {
                Json::String(s) => {
                    Value::JsonData(serde_json::from_str(s).unwrap_or_else(|_| json.clone()))
                }
                other => Value::JsonData(other.clone()),
            },
        };
        Ok(value)
    }

    /// Infers a value and its type from bare JSON.
    pub fn infer(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Logical(*v),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::Text(s.clone()),
            other => Value::JsonData(other.clone()),
        }
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    use serde_json::Value as Json;
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(v) | Value::WoopsaLink(v) | Value::ResourceUrl(v) => write!(f, "{}", v),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

macro_rules! impl_from_for_value {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Value::$variant(v.into())
            }
        }
    };
}

impl_from_for_value!(bool, Logical);
impl_from_for_value!(i32, Integer);
impl_from_for_value!(i64, Integer);
impl_from_for_value!(f64, Real);
impl_from_for_value!(String, Text);
impl_from_for_value!(DateTime<Utc>, DateTime);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

// =============================================================================
// TimedValue
// =============================================================================

/// A value with an optional source timestamp.
///
/// Serializes as `{"Value": .., "Type": .., "TimeStamp": ..}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "WireValue", try_from = "WireValue")]
pub struct TimedValue {
    /// The value.
    pub value: Value,
    /// When the value was sampled, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

impl TimedValue {
    /// Creates a value without a timestamp.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            timestamp: None,
        }
    }

    /// Creates a value stamped with the current time.
    pub fn now(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Creates a null value.
    pub fn null() -> Self {
        Self::default()
    }

    /// Sets the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the type tag of the value.
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

impl From<Value> for TimedValue {
    fn from(value: Value) -> Self {
        Self {
            value,
            timestamp: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireValue {
    #[serde(rename = "Value", default)]
    value: serde_json::Value,
    #[serde(rename = "Type")]
    value_type: ValueType,
    #[serde(rename = "TimeStamp", default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl From<TimedValue> for WireValue {
    fn from(v: TimedValue) -> Self {
        Self {
            value: v.value.to_json(),
            value_type: v.value.value_type(),
            timestamp: v.timestamp,
        }
    }
}

impl TryFrom<WireValue> for TimedValue {
    type Error = ModelError;

    fn try_from(wire: WireValue) -> Result<Self, Self::Error> {
        Ok(Self {
            value: Value::from_json(&wire.value, wire.value_type)?,
            timestamp: wire.timestamp,
        })
    }
}

// =============================================================================
// Notification
// =============================================================================

/// One detected value change, stamped by the channel that queued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    /// Channel-assigned id.
    pub id: NotificationId,
    /// The subscription that produced it.
    pub subscription_id: SubscriptionId,
    /// The new value.
    pub value: TimedValue,
}

// =============================================================================
// MonitorInterval
// =============================================================================

/// How often a subscription samples its property.
///
/// On the wire any negative number of seconds selects
/// [`MonitorInterval::LastPublishedValueOnly`]; `-1` is the canonical form.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use woopsa_core::types::MonitorInterval;
///
/// assert_eq!(MonitorInterval::from_secs_f64(-1.0), MonitorInterval::LastPublishedValueOnly);
/// assert_eq!(
///     MonitorInterval::from_secs_f64(0.5),
///     MonitorInterval::Every(Duration::from_millis(500))
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorInterval {
    /// Sample at a fixed period.
    Every(Duration),
    /// Only the newest pending value matters; older queued values are replaced.
    LastPublishedValueOnly,
}

impl MonitorInterval {
    /// Wire value of the last-value-only sentinel.
    pub const LAST_PUBLISHED_VALUE_ONLY_SECS: f64 = -1.0;

    /// Decodes a wire interval in seconds.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs < 0.0 {
            MonitorInterval::LastPublishedValueOnly
        } else {
            MonitorInterval::Every(duration_from_secs_f64(secs))
        }
    }

    /// Encodes this interval in wire seconds.
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            MonitorInterval::Every(d) => d.as_secs_f64(),
            MonitorInterval::LastPublishedValueOnly => Self::LAST_PUBLISHED_VALUE_ONLY_SECS,
        }
    }

    /// Returns `true` for the last-value-only sentinel.
    pub fn is_last_published_value_only(&self) -> bool {
        matches!(self, MonitorInterval::LastPublishedValueOnly)
    }

    /// The effective sampling period given the subscription's publish interval.
    pub fn sampling_period(&self, publish_interval: Duration) -> Duration {
        match self {
            MonitorInterval::Every(d) => *d,
            MonitorInterval::LastPublishedValueOnly => publish_interval,
        }
    }
}

impl Default for MonitorInterval {
    fn default() -> Self {
        MonitorInterval::Every(Duration::from_millis(200))
    }
}

impl fmt::Display for MonitorInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorInterval::Every(d) => write!(f, "{:?}", d),
            MonitorInterval::LastPublishedValueOnly => write!(f, "last-published-value-only"),
        }
    }
}

/// Converts wire seconds into a duration; negative, NaN or overflowing input maps to zero.
pub fn duration_from_secs_f64(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timed_value_wire_format() {
        let value = TimedValue::new(Value::Integer(42));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, json!({"Value": 42, "Type": "Integer"}));

        let back: TimedValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_timed_value_with_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let value = TimedValue::new("on").with_timestamp(ts);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["Type"], "Text");
        assert_eq!(json["Value"], "on");
        assert!(json["TimeStamp"].as_str().unwrap().starts_with("2025-01-02T03:04:05"));
    }

    #[test]
    fn test_notification_wire_format() {
        let notification = Notification {
            id: NotificationId::new(3),
            subscription_id: SubscriptionId::new(1),
            value: TimedValue::new(true),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            json,
            json!({"Id": 3, "SubscriptionId": 1, "Value": {"Value": true, "Type": "Logical"}})
        );
    }

    #[test]
    fn test_value_from_form_strings() {
        assert_eq!(
            Value::from_json(&json!("12"), ValueType::Integer).unwrap(),
            Value::Integer(12)
        );
        assert_eq!(
            Value::from_json(&json!("true"), ValueType::Logical).unwrap(),
            Value::Logical(true)
        );
        assert!(Value::from_json(&json!("abc"), ValueType::Real).is_err());
    }

    #[test]
    fn test_value_infer() {
        assert_eq!(Value::infer(&json!(3)), Value::Integer(3));
        assert_eq!(Value::infer(&json!(2.5)), Value::Real(2.5));
        assert_eq!(Value::infer(&json!("x")), Value::Text("x".into()));
        assert_eq!(Value::infer(&json!([1, 2])).value_type(), ValueType::JsonData);
    }

    #[test]
    fn test_value_type_parse() {
        assert_eq!(ValueType::parse("integer"), Some(ValueType::Integer));
        assert_eq!(ValueType::parse("WoopsaLink"), Some(ValueType::WoopsaLink));
        assert_eq!(ValueType::parse("bogus"), None);
    }

    #[test]
    fn test_monitor_interval_sentinel() {
        assert!(MonitorInterval::from_secs_f64(-5.0).is_last_published_value_only());
        assert_eq!(MonitorInterval::LastPublishedValueOnly.as_secs_f64(), -1.0);

        let publish = Duration::from_millis(100);
        assert_eq!(
            MonitorInterval::LastPublishedValueOnly.sampling_period(publish),
            publish
        );
        assert_eq!(
            MonitorInterval::Every(Duration::from_millis(10)).sampling_period(publish),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_duration_from_bad_input() {
        assert_eq!(duration_from_secs_f64(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs_f64(-1.0), Duration::ZERO);
        assert_eq!(duration_from_secs_f64(0.25), Duration::from_millis(250));
    }
}
