//! Storage error types.

use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store call did not complete in time
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Key holds a value of a different kind than the command expects
    #[error("Key {key} holds a value of another type")]
    WrongType { key: String },

    /// `RequireAbsent` guard failed, the transaction was rolled back
    #[error("Members {members:?} already present in {key}")]
    MembersPresent { key: String, members: Vec<String> },

    /// `RequirePresent` guard failed, the transaction was rolled back
    #[error("Members {members:?} missing from {key}")]
    MembersMissing { key: String, members: Vec<String> },

    /// Counter or score would overflow
    #[error("Counter overflow on {0}")]
    Overflow(String),

    /// Reply shape did not match the command that produced it
    #[error("Unexpected reply, expected {0}")]
    UnexpectedReply(&'static str),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
