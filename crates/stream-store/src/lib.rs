//! Storage client for append-only event streams.
//!
//! The [`StreamStore`] trait is the only surface the repository consumes:
//! forward reads, batched appends guarded by an [`ExpectedVersion`], and
//! per-stream metadata kept in a separate `$$`-prefixed metadata stream.

pub mod error;
pub mod event;
pub mod memory;
pub mod metadata;
pub mod postgres;
pub mod slice;
pub mod store;

pub use error::{Result, StoreError};
pub use event::{EventData, EventDataBuilder, EventId, ExpectedVersion, RecordedEvent};
pub use memory::InMemoryStreamStore;
pub use metadata::{StreamAcl, StreamMetadata, StreamMetadataResult, metadata_stream_name};
pub use postgres::PostgresStreamStore;
pub use slice::{SliceReadStatus, StreamEventsSlice};
pub use store::{StreamStore, StreamStoreExt, WriteResult};
