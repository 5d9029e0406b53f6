//! Repository error types.

use common::AggregateId;
use stream_store::{ExpectedVersion, StoreError};
use thiserror::Error;

use crate::codec::CodecError;
use crate::registry::RegistryError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The aggregate's stream does not exist.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// A stored event could not be decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The stream moved past the expected version and the repository runs
    /// with `ConflictPolicy::Strict`.
    #[error("Version conflict on stream {stream}: expected {expected}, actual {}", display_position(.actual))]
    VersionConflict {
        stream: String,
        expected: ExpectedVersion,
        actual: Option<u64>,
    },

    /// An error occurred in the stream store.
    #[error("Stream store error: {0}")]
    Store(#[from] StoreError),

    /// The event registry could not be built.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A detached save was requested outside a Tokio runtime.
    #[error("No Tokio runtime for detached save: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// A detached save task panicked or was cancelled.
    #[error("Detached save task failed: {0}")]
    Detached(#[from] tokio::task::JoinError),
}

impl RepositoryError {
    /// Converts a store error, lifting version rejections into
    /// [`RepositoryError::VersionConflict`].
    pub(crate) fn from_append(error: StoreError) -> Self {
        match error {
            StoreError::WrongExpectedVersion {
                stream,
                expected,
                actual,
            } => RepositoryError::VersionConflict {
                stream,
                expected,
                actual,
            },
            other => RepositoryError::Store(other),
        }
    }
}

fn display_position(position: &Option<u64>) -> String {
    match position {
        Some(position) => position.to_string(),
        None => "no stream".to_string(),
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
