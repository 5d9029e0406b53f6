use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    EventData, ExpectedVersion, Result, StoreError, StreamEventsSlice, StreamMetadata,
    StreamMetadataResult,
};

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    /// Position of the last event now in the written stream. Pass it as
    /// `ExpectedVersion::Exact` to append again without a reload.
    pub next_expected_version: u64,
}

/// Core trait for stream storage clients.
///
/// Implementations must be safe to share between tasks; the repository
/// performs no coordination of its own.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Reads up to `max_count` events from `stream`, starting at position
    /// `start` and moving forward.
    async fn read_stream_events_forward(
        &self,
        stream: &str,
        start: u64,
        max_count: usize,
    ) -> Result<StreamEventsSlice>;

    /// Appends events to a stream as one atomic batch.
    ///
    /// Fails with `WrongExpectedVersion` if `expected_version` does not
    /// match the stream, in which case nothing is written.
    async fn append_to_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: Vec<EventData>,
    ) -> Result<WriteResult>;

    /// Writes `metadata` to the metadata stream of `stream`.
    ///
    /// `expected_metastream_version` is checked against the metadata stream,
    /// not against the event stream.
    async fn set_stream_metadata(
        &self,
        stream: &str,
        expected_metastream_version: ExpectedVersion,
        metadata: &StreamMetadata,
    ) -> Result<WriteResult>;

    /// Returns the latest metadata for `stream`, if any was ever written.
    async fn get_stream_metadata(&self, stream: &str) -> Result<Option<StreamMetadataResult>>;
}

#[async_trait]
impl<T: StreamStore + ?Sized> StreamStore for Arc<T> {
    async fn read_stream_events_forward(
        &self,
        stream: &str,
        start: u64,
        max_count: usize,
    ) -> Result<StreamEventsSlice> {
        (**self).read_stream_events_forward(stream, start, max_count).await
    }

    async fn append_to_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: Vec<EventData>,
    ) -> Result<WriteResult> {
        (**self)
            .append_to_stream(stream, expected_version, events)
            .await
    }

    async fn set_stream_metadata(
        &self,
        stream: &str,
        expected_metastream_version: ExpectedVersion,
        metadata: &StreamMetadata,
    ) -> Result<WriteResult> {
        (**self)
            .set_stream_metadata(stream, expected_metastream_version, metadata)
            .await
    }

    async fn get_stream_metadata(&self, stream: &str) -> Result<Option<StreamMetadataResult>> {
        (**self).get_stream_metadata(stream).await
    }
}

/// Extension trait providing convenience methods for stream stores.
#[async_trait]
pub trait StreamStoreExt: StreamStore {
    /// Appends a single event to a stream.
    async fn append_event(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        event: EventData,
    ) -> Result<WriteResult> {
        self.append_to_stream(stream, expected_version, vec![event])
            .await
    }

    /// Checks if a stream has any events.
    async fn stream_exists(&self, stream: &str) -> Result<bool> {
        Ok(self.read_stream_events_forward(stream, 0, 1).await?.is_found())
    }
}

// Blanket implementation for all StreamStore implementations
impl<T: StreamStore + ?Sized> StreamStoreExt for T {}

/// Validates an append request before it reaches storage.
pub fn validate_append(stream: &str, events: &[EventData]) -> Result<()> {
    if stream.is_empty() {
        return Err(StoreError::InvalidAppend {
            stream: stream.to_string(),
            reason: "stream name must not be empty".to_string(),
        });
    }

    if stream.starts_with(crate::metadata::METADATA_STREAM_PREFIX) {
        return Err(StoreError::InvalidAppend {
            stream: stream.to_string(),
            reason: "metadata streams are written through set_stream_metadata".to_string(),
        });
    }

    if let Some(event) = events.iter().find(|e| e.event_type.is_empty()) {
        return Err(StoreError::InvalidAppend {
            stream: stream.to_string(),
            reason: format!("event {} has an empty type", event.event_id),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> EventData {
        EventData::builder()
            .event_type(event_type)
            .data(b"{}".to_vec(), true)
            .try_build()
            .unwrap()
    }

    #[test]
    fn validate_accepts_regular_stream() {
        assert!(validate_append("orders-Order-1", &[event("Created")]).is_ok());
        assert!(validate_append("orders-Order-1", &[]).is_ok());
    }

    #[test]
    fn validate_rejects_metadata_stream() {
        let result = validate_append("$$orders-Order-1", &[event("Created")]);
        assert!(matches!(result, Err(StoreError::InvalidAppend { .. })));
    }

    #[test]
    fn validate_rejects_empty_names() {
        assert!(validate_append("", &[event("Created")]).is_err());
        assert!(validate_append("orders-Order-1", &[event("")]).is_err());
    }
}
