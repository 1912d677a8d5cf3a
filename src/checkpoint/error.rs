//! Checkpoint error types.

use thiserror::Error;

/// Errors that can occur while saving or restoring a session.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// The checkpoint was written by an incompatible format version.
    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The checkpoint does not fit the machine it is resumed against.
    #[error("Checkpoint validation failed: {0}")]
    ValidationFailed(String),
}

impl From<serde_json::Error> for CheckpointError {
    fn from(error: serde_json::Error) -> Self {
        if error.is_io() {
            CheckpointError::SerializationFailed(error.to_string())
        } else {
            CheckpointError::DeserializationFailed(error.to_string())
        }
    }
}
