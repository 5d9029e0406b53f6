use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    EventData, ExpectedVersion, RecordedEvent, Result, StoreError, StreamEventsSlice,
    StreamMetadata, StreamMetadataResult,
    store::{StreamStore, WriteResult, validate_append},
};

#[derive(Debug, Default)]
struct CallCounters {
    reads: AtomicUsize,
    appends: AtomicUsize,
    metadata_writes: AtomicUsize,
}

/// In-memory stream store for testing.
///
/// Behaves like a real store for versioning purposes and counts calls so
/// tests can assert how many round trips an operation made.
#[derive(Clone, Default)]
pub struct InMemoryStreamStore {
    streams: Arc<RwLock<HashMap<String, Vec<RecordedEvent>>>>,
    metadata: Arc<RwLock<HashMap<String, Vec<StreamMetadata>>>>,
    calls: Arc<CallCounters>,
}

impl InMemoryStreamStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event in `stream`, oldest first.
    pub async fn events(&self, stream: &str) -> Vec<RecordedEvent> {
        self.streams
            .read()
            .await
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the total number of events stored across all streams.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Number of `read_stream_events_forward` calls made so far.
    pub fn read_calls(&self) -> usize {
        self.calls.reads.load(Ordering::SeqCst)
    }

    /// Number of `append_to_stream` calls made so far.
    pub fn append_calls(&self) -> usize {
        self.calls.appends.load(Ordering::SeqCst)
    }

    /// Number of `set_stream_metadata` calls made so far.
    pub fn metadata_calls(&self) -> usize {
        self.calls.metadata_writes.load(Ordering::SeqCst)
    }

    /// Clears all streams, metadata and call counters.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
        self.metadata.write().await.clear();
        self.calls.reads.store(0, Ordering::SeqCst);
        self.calls.appends.store(0, Ordering::SeqCst);
        self.calls.metadata_writes.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamStore for InMemoryStreamStore {
    async fn read_stream_events_forward(
        &self,
        stream: &str,
        start: u64,
        max_count: usize,
    ) -> Result<StreamEventsSlice> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);

        let streams = self.streams.read().await;
        let Some(events) = streams.get(stream).filter(|events| !events.is_empty()) else {
            return Ok(StreamEventsSlice::not_found(stream, start));
        };

        let last_event_number = events.len() as u64 - 1;
        let page: Vec<_> = events
            .iter()
            .skip(start as usize)
            .take(max_count)
            .cloned()
            .collect();

        Ok(StreamEventsSlice::found(
            stream,
            start,
            last_event_number,
            page,
        ))
    }

    async fn append_to_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: Vec<EventData>,
    ) -> Result<WriteResult> {
        self.calls.appends.fetch_add(1, Ordering::SeqCst);
        validate_append(stream, &events)?;

        let mut streams = self.streams.write().await;
        let existing = streams.entry(stream.to_string()).or_default();
        let current = (existing.len() as u64).checked_sub(1);

        if !expected_version.matches(current) {
            if existing.is_empty() {
                streams.remove(stream);
            }
            return Err(StoreError::WrongExpectedVersion {
                stream: stream.to_string(),
                expected: expected_version,
                actual: current,
            });
        }

        let created = Utc::now();
        let mut next_number = existing.len() as u64;
        for event in events {
            existing.push(RecordedEvent::from_event_data(
                stream,
                next_number,
                event,
                created,
            ));
            next_number += 1;
        }

        let last = (existing.len() as u64).checked_sub(1);
        if existing.is_empty() {
            streams.remove(stream);
        }

        tracing::trace!(stream, ?last, "appended to in-memory stream");
        Ok(WriteResult {
            next_expected_version: last.unwrap_or_default(),
        })
    }

    async fn set_stream_metadata(
        &self,
        stream: &str,
        expected_metastream_version: ExpectedVersion,
        metadata: &StreamMetadata,
    ) -> Result<WriteResult> {
        self.calls.metadata_writes.fetch_add(1, Ordering::SeqCst);

        let mut all = self.metadata.write().await;
        let history = all.entry(stream.to_string()).or_default();
        let current = (history.len() as u64).checked_sub(1);

        if !expected_metastream_version.matches(current) {
            let actual = current;
            if history.is_empty() {
                all.remove(stream);
            }
            return Err(StoreError::WrongExpectedVersion {
                stream: crate::metadata_stream_name(stream),
                expected: expected_metastream_version,
                actual,
            });
        }

        history.push(metadata.clone());
        Ok(WriteResult {
            next_expected_version: history.len() as u64 - 1,
        })
    }

    async fn get_stream_metadata(&self, stream: &str) -> Result<Option<StreamMetadataResult>> {
        let all = self.metadata.read().await;
        Ok(all.get(stream).and_then(|history| {
            history.last().map(|metadata| StreamMetadataResult {
                stream: stream.to_string(),
                metastream_version: history.len() as u64 - 1,
                metadata: metadata.clone(),
            })
        }))
    }
}
