//! Common error types for voxscreen

use thiserror::Error;

/// Common result type for voxscreen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the gateway and the client
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input, rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
