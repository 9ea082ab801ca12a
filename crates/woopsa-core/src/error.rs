// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for Woopsa.
//!
//! Every error knows three things about itself besides its message:
//!
//! - whether a caller may retry it (`is_retryable`)
//! - the HTTP status code the transport answers with (`status_code`)
//! - the Woopsa exception name written into error bodies (`wire_type`)
//!
//! # Error Hierarchy
//!
//! ```text
//! WoopsaError (root)
//! ├── SubscriptionError - Channel and subscription operations
//! ├── ModelError        - Object model reads, writes and lookups
//! └── ConfigError       - Configuration parsing and validation
//! ```
//!
//! # Examples
//!
//! ```
//! use woopsa_core::error::{SubscriptionError, WoopsaError};
//! use woopsa_core::types::ChannelId;
//!
//! let error = SubscriptionError::invalid_channel(ChannelId::new(42));
//! assert_eq!(error.wire_type(), "WoopsaInvalidSubscriptionChannelException");
//!
//! let root: WoopsaError = error.into();
//! assert_eq!(root.error_type(), "subscription");
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ChannelId;

// =============================================================================
// Wire exception names
// =============================================================================

/// Exception name for an unknown or expired subscription channel.
pub const INVALID_CHANNEL_EXCEPTION: &str = "WoopsaInvalidSubscriptionChannelException";

/// Exception name for a channel whose queue evicted unread notifications.
pub const NOTIFICATIONS_LOST_EXCEPTION: &str = "WoopsaNotificationsLostException";

/// Exception name for a path that does not resolve.
pub const NOT_FOUND_EXCEPTION: &str = "WoopsaNotFoundException";

/// Generic exception name.
pub const GENERIC_EXCEPTION: &str = "WoopsaException";

// =============================================================================
// WoopsaError - Root Error Type
// =============================================================================

/// The root error type for Woopsa.
#[derive(Debug, Error)]
pub enum WoopsaError {
    /// Subscription engine error.
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Object model error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WoopsaError {
    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WoopsaError::Subscription(e) => e.is_retryable(),
            WoopsaError::Model(e) => e.is_retryable(),
            WoopsaError::Config(_) => false,
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            WoopsaError::Subscription(e) => format!("구독 오류: {}", e.user_message()),
            WoopsaError::Model(e) => format!("모델 오류: {}", e.user_message()),
            WoopsaError::Config(e) => format!("설정 오류: {}", e.user_message()),
        }
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            WoopsaError::Subscription(_) => "subscription",
            WoopsaError::Model(_) => "model",
            WoopsaError::Config(_) => "config",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            WoopsaError::Subscription(e) => e.status_code(),
            WoopsaError::Model(e) => e.status_code(),
            WoopsaError::Config(_) => 500,
        }
    }

    /// Returns the Woopsa exception name for this error.
    pub fn wire_type(&self) -> &'static str {
        match self {
            WoopsaError::Subscription(e) => e.wire_type(),
            WoopsaError::Model(e) => e.wire_type(),
            WoopsaError::Config(_) => GENERIC_EXCEPTION,
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Errors surfaced by the subscription service and its channels.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The channel is unknown (never created, reaped, or the server restarted).
    #[error("Invalid subscription channel: {channel_id}")]
    InvalidChannel {
        /// The channel that was referenced.
        channel_id: ChannelId,
    },

    /// The channel's queue evicted notifications the client never read.
    #[error("Notifications lost on channel {channel_id}; acknowledge with id 0")]
    NotificationsLost {
        /// The channel that lost notifications.
        channel_id: ChannelId,
    },

    /// The subscribed path does not resolve.
    #[error("Path not found: {path}")]
    NotFound {
        /// The unresolved path.
        path: String,
    },

    /// The channel was stopped and accepts no further work.
    #[error("Subscription channel has been stopped")]
    ChannelStopped,

    /// An upstream client refused or failed the operation.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message.
        message: String,
    },
}

impl SubscriptionError {
    /// Creates an invalid channel error.
    pub fn invalid_channel(channel_id: ChannelId) -> Self {
        Self::InvalidChannel { channel_id }
    }

    /// Creates a notifications lost error.
    pub fn notifications_lost(channel_id: ChannelId) -> Self {
        Self::NotificationsLost { channel_id }
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// A lost-notifications error is resolved by polling again with id 0.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotificationsLost { .. } | Self::Upstream { .. })
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Returns the Woopsa exception name for this error.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::InvalidChannel { .. } | Self::ChannelStopped => INVALID_CHANNEL_EXCEPTION,
            Self::NotificationsLost { .. } => NOTIFICATIONS_LOST_EXCEPTION,
            Self::NotFound { .. } => NOT_FOUND_EXCEPTION,
            Self::Upstream { .. } => GENERIC_EXCEPTION,
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidChannel { channel_id } => {
                format!("유효하지 않은 구독 채널: {}", channel_id)
            }
            Self::NotificationsLost { .. } => {
                "알림이 유실되었습니다. 다시 연결해 주세요".to_string()
            }
            Self::NotFound { path } => format!("경로를 찾을 수 없습니다: {}", path),
            Self::ChannelStopped => "구독 채널이 중지되었습니다".to_string(),
            Self::Upstream { message } => format!("상위 서버 오류: {}", message),
        }
    }
}

impl From<ModelError> for SubscriptionError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::NotFound { path } => Self::NotFound { path },
            other => Self::Upstream {
                message: other.to_string(),
            },
        }
    }
}

// =============================================================================
// ModelError
// =============================================================================

/// Object model errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No element at this path.
    #[error("Element not found: {path}")]
    NotFound {
        /// The unresolved path.
        path: String,
    },

    /// Reading a property failed.
    #[error("Read failed for '{path}': {message}")]
    ReadFailed {
        /// The property path.
        path: String,
        /// Error message.
        message: String,
    },

    /// Writing a property failed.
    #[error("Write failed for '{path}': {message}")]
    WriteFailed {
        /// The property path.
        path: String,
        /// Error message.
        message: String,
    },

    /// The property is read-only.
    #[error("Property is not writable: {path}")]
    NotWritable {
        /// The property path.
        path: String,
    },

    /// A value did not match the property's type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type name.
        expected: String,
        /// The actual type name.
        actual: String,
    },

    /// A mounted upstream client failed.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message.
        message: String,
    },
}

impl ModelError {
    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a read failed error.
    pub fn read_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a not writable error.
    pub fn not_writable(path: impl Into<String>) -> Self {
        Self::NotWritable { path: path.into() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadFailed { .. } | Self::Upstream { .. })
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Returns the Woopsa exception name for this error.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => NOT_FOUND_EXCEPTION,
            _ => GENERIC_EXCEPTION,
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { path } => format!("요소를 찾을 수 없습니다: {}", path),
            Self::ReadFailed { path, .. } => format!("값 읽기 실패: {}", path),
            Self::WriteFailed { path, .. } => format!("값 쓰기 실패: {}", path),
            Self::NotWritable { path } => format!("쓰기 불가능한 속성: {}", path),
            Self::TypeMismatch { expected, actual } => {
                format!("타입 불일치 (기대: {}, 실제: {})", expected, actual)
            }
            Self::Upstream { message } => format!("상위 서버 오류: {}", message),
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// An environment placeholder had no value and no default.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// The variable name.
        name: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing environment variable error.
    pub fn missing_env(name: impl Into<String>) -> Self {
        Self::MissingEnv { name: name.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Parse { path, message } => {
                format!("설정 파일 파싱 실패 ({}): {}", path.display(), message)
            }
            ConfigError::Validation { field, message } => {
                format!("설정 검증 실패 ({}): {}", field, message)
            }
            ConfigError::MissingEnv { name } => format!("환경 변수 누락: {}", name),
            ConfigError::Io { path, .. } => {
                format!("설정 파일 읽기 실패: {}", path.display())
            }
        }
    }
}

// =============================================================================
// Result aliases
// =============================================================================

/// Result type alias for `WoopsaError`.
pub type WoopsaResult<T> = Result<T, WoopsaError>;

/// Result type alias for `SubscriptionError`.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Result type alias for `ModelError`.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type alias for `ConfigError`.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_wire_types() {
        let channel = ChannelId::new(7);
        assert_eq!(
            SubscriptionError::invalid_channel(channel).wire_type(),
            INVALID_CHANNEL_EXCEPTION
        );
        assert_eq!(
            SubscriptionError::notifications_lost(channel).wire_type(),
            NOTIFICATIONS_LOST_EXCEPTION
        );
        assert_eq!(SubscriptionError::not_found("Votes").wire_type(), NOT_FOUND_EXCEPTION);
        assert_eq!(SubscriptionError::ChannelStopped.wire_type(), INVALID_CHANNEL_EXCEPTION);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SubscriptionError::not_found("a").status_code(), 404);
        assert_eq!(SubscriptionError::invalid_channel(ChannelId::new(1)).status_code(), 500);
        assert_eq!(ModelError::not_found("a").status_code(), 404);
        assert_eq!(ModelError::not_writable("a").status_code(), 500);
    }

    #[test]
    fn test_model_error_converts_to_subscription_error() {
        let error: SubscriptionError = ModelError::not_found("Votes").into();
        assert!(matches!(error, SubscriptionError::NotFound { ref path } if path == "Votes"));

        let error: SubscriptionError = ModelError::read_failed("Votes", "boom").into();
        assert!(matches!(error, SubscriptionError::Upstream { .. }));
    }

    #[test]
    fn test_root_error_conversion() {
        let error: WoopsaError = ModelError::read_failed("Votes", "boom").into();
        assert!(error.is_retryable());
        assert_eq!(error.error_type(), "model");
        assert_eq!(error.wire_type(), GENERIC_EXCEPTION);

        let error: WoopsaError = ConfigError::validation("api.port", "must be positive").into();
        assert!(!error.is_retryable());
        assert_eq!(error.error_type(), "config");
    }
}
