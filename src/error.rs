//! Error types for the NeethiSaarathi client

use thiserror::Error;

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An answer could not be converted to a profile field
    #[error("Invalid answer for {field}: {value:?}")]
    InvalidAnswer { field: String, value: String },

    /// Session storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ClientError {
    fn from(e: toml::de::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
