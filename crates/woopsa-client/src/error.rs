// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client errors.
//!
//! Remote failures are classified by the exception name the server put in
//! the error body, so the reconnection logic can react to each kind:
//!
//! | Error | Reaction |
//! |---|---|
//! | `InvalidChannel` | recreate the channel and re-register |
//! | `NotificationsLost` | poll again at once with id 0 |
//! | `Transport` | wait the retry period, poll again with the same id |

use thiserror::Error;

use woopsa_core::error::{
    ModelError, SubscriptionError, INVALID_CHANNEL_EXCEPTION, NOTIFICATIONS_LOST_EXCEPTION,
    NOT_FOUND_EXCEPTION,
};

/// Errors returned by transports and client channels.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server does not know the channel.
    #[error("Invalid subscription channel: {message}")]
    InvalidChannel {
        /// Server message.
        message: String,
    },

    /// The server's queue evicted notifications.
    #[error("Notifications lost: {message}")]
    NotificationsLost {
        /// Server message.
        message: String,
    },

    /// The path does not resolve on the server.
    #[error("Not found: {message}")]
    NotFound {
        /// Server message.
        message: String,
    },

    /// Any other error reported by the server.
    #[error("Remote error ({kind}): {message}")]
    Remote {
        /// Exception name.
        kind: String,
        /// Server message.
        message: String,
    },

    /// The server could not be reached.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The server answered with something unreadable.
    #[error("Decode error: {message}")]
    Decode {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Classifies a server error body.
    pub fn from_remote(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            INVALID_CHANNEL_EXCEPTION => Self::InvalidChannel { message },
            NOTIFICATIONS_LOST_EXCEPTION => Self::NotificationsLost { message },
            NOT_FOUND_EXCEPTION => Self::NotFound { message },
            other => Self::Remote {
                kind: other.to_string(),
                message,
            },
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns `true` if the operation may be retried unchanged after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidChannel { .. } => "invalid_channel",
            Self::NotificationsLost { .. } => "notifications_lost",
            Self::NotFound { .. } => "not_found",
            Self::Remote { .. } => "remote",
            Self::Transport { .. } => "transport",
            Self::Decode { .. } => "decode",
        }
    }

    /// Converts into a model error for a request on `path`.
    pub fn into_model_error(self, path: &str) -> ModelError {
        match self {
            Self::NotFound { .. } => ModelError::not_found(path),
            other => ModelError::upstream(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::decode(error.to_string())
        } else {
            Self::transport(error.to_string())
        }
    }
}

impl From<SubscriptionError> for ClientError {
    fn from(error: SubscriptionError) -> Self {
        Self::from_remote(error.wire_type(), error.to_string())
    }
}

impl From<ModelError> for ClientError {
    fn from(error: ModelError) -> Self {
        Self::from_remote(error.wire_type(), error.to_string())
    }
}

/// Result type alias for `ClientError`.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use woopsa_core::types::ChannelId;

    #[test]
    fn test_classifies_remote_errors() {
        assert!(matches!(
            ClientError::from_remote(INVALID_CHANNEL_EXCEPTION, "x"),
            ClientError::InvalidChannel { .. }
        ));
        assert!(matches!(
            ClientError::from_remote(NOTIFICATIONS_LOST_EXCEPTION, "x"),
            ClientError::NotificationsLost { .. }
        ));
        assert!(matches!(
            ClientError::from_remote("WoopsaException", "x"),
            ClientError::Remote { .. }
        ));
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ClientError::transport("refused").is_retryable());
        assert!(!ClientError::decode("garbage").is_retryable());
        assert!(!ClientError::from_remote(NOT_FOUND_EXCEPTION, "x").is_retryable());
    }

    #[test]
    fn test_from_subscription_error() {
        let error: ClientError = SubscriptionError::invalid_channel(ChannelId::new(3)).into();
        assert_eq!(error.error_type(), "invalid_channel");

        let model = ClientError::from_remote(NOT_FOUND_EXCEPTION, "gone").into_model_error("A/B");
        assert!(matches!(model, ModelError::NotFound { ref path } if path == "A/B"));
    }
}
