//! Error types for diary core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Cryptographic and decoding failures are distinguished here for
//! diagnostics, but the store layer collapses them into `None`/`false`
//! results at its boundary; only I/O errors propagate to callers.

use thiserror::Error;

/// Result type alias for diary operations.
pub type Result<T> = std::result::Result<T, DiaryError>;

/// Core error type for diary operations.
#[derive(Debug, Error)]
pub enum DiaryError {
    /// AEAD tag verification failed: wrong password or tampered record
    #[error("Authentication failed: wrong password or tampered record")]
    Authentication,

    /// Persisted record is too short to contain a salt and IV header
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Plaintext decrypted successfully but is not a valid entry payload
    #[error("Payload decode error: {0}")]
    PayloadDecode(String),

    /// Record id does not exist in the store
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Encryption primitive error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for DiaryError {
    fn from(err: std::io::Error) -> Self {
        DiaryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DiaryError {
    fn from(err: serde_json::Error) -> Self {
        DiaryError::PayloadDecode(err.to_string())
    }
}
