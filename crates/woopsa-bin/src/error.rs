// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the binary.

use thiserror::Error;

/// Result type alias for binary operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that end the process.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration problem found outside the loader.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A component could not be built.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Failure while serving.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration loading failed.
    #[error("Config error: {0}")]
    Config(#[from] woopsa_config::ConfigError),

    /// The HTTP server failed.
    #[error("API error: {0}")]
    Api(#[from] woopsa_api::ApiError),

    /// An upstream client could not be created.
    #[error("Client error: {0}")]
    Client(#[from] woopsa_client::ClientError),

    /// An error with added context.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Initialization(_) | Self::Client(_) => 2,
            Self::Runtime(_) => 3,
            Self::Api(_) => 4,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

/// Prints an error and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context() {
        let err = BinError::init("port in use").with_context("starting API");
        assert_eq!(err.to_string(), "starting API: Initialization error: port in use");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("x").exit_code(), 1);
        assert_eq!(BinError::runtime("x").exit_code(), 3);
        let config: BinError = woopsa_config::ConfigError::validation("api.port", "bad").into();
        assert_eq!(config.exit_code(), 1);
    }
}
