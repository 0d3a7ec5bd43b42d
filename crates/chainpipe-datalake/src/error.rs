//! Error types for the data lake.

use thiserror::Error;

/// Errors that can occur while storing or retrieving resources.
#[derive(Debug, Error)]
pub enum DataLakeError {
    /// The resource name is an empty string.
    #[error("resource name is required")]
    ResourceNameRequired,

    /// The resource does not exist in the backing storage.
    #[error("resource not found: {path}")]
    NotFound { path: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}
