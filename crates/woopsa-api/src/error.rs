// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types.
//!
//! Every failure becomes a Woopsa error body:
//!
//! ```json
//! {"Error": true, "Message": "...", "Type": "WoopsaInvalidSubscriptionChannelException"}
//! ```
//!
//! with status 404 for unknown paths and 500 for everything else, so the
//! client can tell a reaped channel from a lost notification from a
//! transport failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use woopsa_core::error::{ModelError, SubscriptionError, GENERIC_EXCEPTION};
use woopsa_core::protocol::ErrorBody;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error type with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Subscription service failure.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Object model failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Malformed request parameters.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Metrics registry or encoding failure.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Unexpected server failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl ApiError {
    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            ApiError::Subscription(e) => e.status_code(),
            ApiError::Model(e) => e.status_code(),
            ApiError::BadRequest { .. } => 400,
            ApiError::Metrics(_) | ApiError::Internal { .. } => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Woopsa exception name for the error body.
    pub fn wire_type(&self) -> &'static str {
        match self {
            ApiError::Subscription(e) => e.wire_type(),
            ApiError::Model(e) => e.wire_type(),
            ApiError::BadRequest { .. } | ApiError::Metrics(_) | ApiError::Internal { .. } => {
                GENERIC_EXCEPTION
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let wire_type = self.wire_type();

        if status.is_server_error() {
            tracing::debug!(error = %self, wire_type, status = %status, "Request failed");
        } else {
            tracing::trace!(error = %self, wire_type, status = %status, "Request rejected");
        }

        (status, Json(ErrorBody::new(wire_type, self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woopsa_core::error::{INVALID_CHANNEL_EXCEPTION, NOT_FOUND_EXCEPTION};
    use woopsa_core::types::ChannelId;

    #[test]
    fn test_status_mapping() {
        let invalid: ApiError = SubscriptionError::invalid_channel(ChannelId::new(1)).into();
        assert_eq!(invalid.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(invalid.wire_type(), INVALID_CHANNEL_EXCEPTION);

        let missing: ApiError = ModelError::not_found("Votes").into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.wire_type(), NOT_FOUND_EXCEPTION);

        let bad = ApiError::bad_request("missing SubscriptionChannel");
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.wire_type(), GENERIC_EXCEPTION);
    }
}
