use thiserror::Error;

use crate::ExpectedVersion;

/// Errors that can occur when talking to the stream store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stream was not at the version the writer expected.
    ///
    /// `actual` is the position of the last event in the stream, or `None`
    /// when the stream does not exist.
    #[error("Wrong expected version for stream {stream}: expected {expected}, actual {}", display_position(.actual))]
    WrongExpectedVersion {
        stream: String,
        expected: ExpectedVersion,
        actual: Option<u64>,
    },

    /// The append request itself was invalid.
    #[error("Invalid append to stream {stream}: {reason}")]
    InvalidAppend { stream: String, reason: String },

    /// The store could not be reached or the connection broke mid-request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for optimistic-concurrency rejections.
    pub fn is_wrong_expected_version(&self) -> bool {
        matches!(self, StoreError::WrongExpectedVersion { .. })
    }
}

fn display_position(position: &Option<u64>) -> String {
    match position {
        Some(position) => position.to_string(),
        None => "no stream".to_string(),
    }
}

/// Result type for stream store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
