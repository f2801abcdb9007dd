//! Error types for utility functions.

use thiserror::Error;

/// Result type for utility operations.
pub type Result<T> = std::result::Result<T, UtilsError>;

/// Errors that can occur in utility operations.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// The backend could not be reached, even after retrying.
    #[error("Network error after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    /// The per-call timeout elapsed on every attempt.
    #[error("Request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// The request could not be built (bad URL, bad header name or value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl UtilsError {
    /// True when the error came from the transport rather than from the caller.
    pub fn is_transport(&self) -> bool {
        matches!(self, UtilsError::Network { .. } | UtilsError::Timeout { .. })
    }
}

impl From<serde_json::Error> for UtilsError {
    fn from(err: serde_json::Error) -> Self {
        UtilsError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for UtilsError {
    fn from(err: serde_yaml::Error) -> Self {
        UtilsError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for UtilsError {
    fn from(err: toml::de::Error) -> Self {
        UtilsError::Serialization(err.to_string())
    }
}
