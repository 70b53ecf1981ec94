//! services/atlas/src/error.rs
//!
//! Defines the primary error type for the application shell.

use crate::config::ConfigError;
use atlas_core::{GatewayError, SubmitError, ValidationError};

/// The primary error type for the `atlas` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the gateway port.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A suggestion that failed local validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Represents an error from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading the session file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<SubmitError> for AppError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Invalid(v) => AppError::Validation(v),
            SubmitError::Gateway(g) => AppError::Gateway(g),
        }
    }
}

impl AppError {
    /// The line shown to the user for a failed command.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Gateway(e) => e.user_message(),
            AppError::Validation(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}
