//! Event-sourced aggregate repository.
//!
//! Loads aggregates by replaying their stream and saves pending events with
//! optimistic concurrency. Saving follows this state machine:
//!
//! ```text
//! Pending -> Appending(expected) -> Committed
//!                  | version conflict
//!                  +-> BestEffortRetry: RetryingAny -> Committed | Fatal
//!                  +-> Strict: Fatal(VersionConflict)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use common::{AggregateId, Category};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use stream_store::{
    EventData, ExpectedVersion, SliceReadStatus, StreamMetadata, StreamStore, StreamStoreExt,
    WriteResult,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::codec::EventCodec;
use crate::config::{ConflictPolicy, RepositoryConfig};
use crate::error::{RepositoryError, Result};
use crate::reducer::try_reduce;
use crate::registry::EventRegistry;
use crate::stream_name::StreamName;

/// Maps aggregates to streams in a [`StreamStore`].
///
/// The repository holds no per-call state: only its configuration, the
/// event codec and a handle to the store, which is cloned into detached
/// metadata and save tasks.
#[derive(Clone)]
pub struct Repository<S> {
    store: S,
    codec: EventCodec,
    metadata: Option<Arc<StreamMetadata>>,
    config: RepositoryConfig,
}

impl<S> Repository<S>
where
    S: StreamStore + Clone + 'static,
{
    /// Starts building a repository on top of `store`.
    pub fn builder(store: S) -> RepositoryBuilder<S> {
        RepositoryBuilder::new(store)
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn category(&self) -> &Category {
        &self.config.category
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.config.conflict_policy
    }

    pub fn codec(&self) -> &EventCodec {
        &self.codec
    }

    /// Returns the stream that holds aggregate `A` with `id`.
    pub fn stream_name_for<A: Aggregate>(&self, id: &AggregateId) -> StreamName {
        StreamName::for_aggregate(&self.config.category, A::aggregate_type(), id)
    }

    /// Loads an aggregate by replaying its stream.
    ///
    /// Reads once from the start of the stream, at most `read_page_size`
    /// events; longer histories are not paged through.
    #[tracing::instrument(
        skip(self),
        fields(category = %self.config.category, aggregate_type = A::aggregate_type())
    )]
    pub async fn get_by_id<A: Aggregate>(&self, id: &AggregateId) -> Result<A> {
        let stream = self.stream_name_for::<A>(id);
        metrics::counter!("repository_reads_total").increment(1);

        let slice = self
            .store
            .read_stream_events_forward(stream.as_str(), 0, self.config.read_page_size)
            .await?;

        if slice.status == SliceReadStatus::StreamNotFound {
            return Err(RepositoryError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id.clone(),
            });
        }

        if !slice.is_end_of_stream {
            tracing::warn!(
                %stream,
                page_size = self.config.read_page_size,
                last_event_number = ?slice.last_event_number,
                "stream longer than read page size, replaying first page only"
            );
        }

        let events = slice
            .events
            .iter()
            .map(|recorded| self.codec.decode_recorded::<A::Event>(recorded));
        let aggregate: A = try_reduce(id.clone(), events)?;

        tracing::debug!(%stream, version = %aggregate.version(), "aggregate loaded");
        Ok(aggregate)
    }

    /// Checks whether any event was ever stored for aggregate `A` with `id`.
    pub async fn exists<A: Aggregate>(&self, id: &AggregateId) -> Result<bool> {
        let stream = self.stream_name_for::<A>(id);
        Ok(self.store.stream_exists(stream.as_str()).await?)
    }

    /// Persists the aggregate's uncommitted events and returns them.
    ///
    /// The first save of an aggregate expects the stream not to exist;
    /// later saves expect the last committed position. A version conflict is
    /// handled according to the configured [`ConflictPolicy`]; any other
    /// store error is returned unchanged and leaves the aggregate untouched.
    ///
    /// With nothing to save no append is issued. Stream metadata, when
    /// configured, is written in the background on every call and its
    /// outcome is never reported.
    #[tracing::instrument(
        skip(self, aggregate),
        fields(
            category = %self.config.category,
            aggregate_type = A::aggregate_type(),
            aggregate_id = %aggregate.id()
        )
    )]
    pub async fn save<A: Aggregate>(&self, aggregate: &mut A) -> Result<Vec<A::Event>> {
        let started = Instant::now();
        let stream = self.stream_name_for::<A>(aggregate.id());
        self.save_metadata(&stream);

        if aggregate.uncommitted_events().is_empty() {
            tracing::debug!(%stream, "nothing to save");
            return Ok(Vec::new());
        }

        let expected_version = aggregate.version().expected_version();
        let envelopes = self.encode_all(aggregate.uncommitted_events())?;

        let result = append_with_policy(
            &self.store,
            self.config.conflict_policy,
            &stream,
            expected_version,
            envelopes,
        )
        .await?;

        let events = aggregate.mark_committed();

        metrics::counter!("repository_saves_total").increment(1);
        metrics::counter!("repository_events_appended_total").increment(events.len() as u64);
        metrics::histogram!("repository_save_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            %stream,
            count = events.len(),
            next_expected_version = result.next_expected_version,
            "aggregate saved"
        );

        Ok(events)
    }

    /// Starts saving the aggregate's uncommitted events without waiting for
    /// the append.
    ///
    /// Uses the same expected-version rule and conflict policy as
    /// [`save`](Self::save). The aggregate is not modified: once the returned
    /// [`PendingSave`] resolves successfully, call
    /// [`Aggregate::mark_committed`] before raising more events.
    ///
    /// Encoding errors are returned immediately. Called outside a Tokio
    /// runtime it fails with [`RepositoryError::NoRuntime`] before any work
    /// is started.
    pub fn save_detached<A: Aggregate>(&self, aggregate: &A) -> Result<PendingSave<A::Event>> {
        let runtime = Handle::try_current()?;
        let stream = self.stream_name_for::<A>(aggregate.id());
        self.save_metadata(&stream);

        let events = aggregate.uncommitted_events().to_vec();
        if events.is_empty() {
            return Ok(PendingSave::ready(events));
        }

        let expected_version = aggregate.version().expected_version();
        let envelopes = self.encode_all(&events)?;
        let store = self.store.clone();
        let policy = self.config.conflict_policy;

        tracing::debug!(%stream, count = events.len(), "detached save started");
        let handle = runtime.spawn(async move {
            append_with_policy(&store, policy, &stream, expected_version, envelopes).await
        });

        Ok(PendingSave::spawned(handle, events))
    }

    fn encode_all<E: DomainEvent>(&self, events: &[E]) -> Result<Vec<EventData>> {
        events
            .iter()
            .map(|event| self.codec.encode(event).map_err(RepositoryError::from))
            .collect()
    }

    /// Writes stream metadata on a detached task; failures are logged and
    /// dropped.
    fn save_metadata(&self, stream: &StreamName) {
        let Some(metadata) = self.metadata.clone() else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            metrics::counter!("repository_metadata_write_failures_total").increment(1);
            tracing::warn!(%stream, "no tokio runtime, skipping stream metadata write");
            return;
        };

        let store = self.store.clone();
        let stream = stream.to_string();
        let expected = self.config.metastream_expected_version;

        runtime.spawn(async move {
            match store.set_stream_metadata(&stream, expected, &metadata).await {
                Ok(result) => tracing::trace!(
                    %stream,
                    metastream_version = result.next_expected_version,
                    "stream metadata written"
                ),
                Err(error) => {
                    metrics::counter!("repository_metadata_write_failures_total").increment(1);
                    tracing::warn!(%stream, %error, "stream metadata write failed, dropping");
                }
            }
        });
    }
}

/// Appends `envelopes`, falling back to one `ExpectedVersion::Any` retry on a
/// version conflict when the policy allows it.
async fn append_with_policy<S: StreamStore>(
    store: &S,
    policy: ConflictPolicy,
    stream: &StreamName,
    expected_version: ExpectedVersion,
    envelopes: Vec<EventData>,
) -> Result<WriteResult> {
    let retry = match policy {
        ConflictPolicy::BestEffortRetry => Some(envelopes.clone()),
        ConflictPolicy::Strict => None,
    };

    let error = match store
        .append_to_stream(stream.as_str(), expected_version, envelopes)
        .await
    {
        Ok(result) => return Ok(result),
        Err(error) => error,
    };

    match retry {
        Some(envelopes) if error.is_wrong_expected_version() => {
            metrics::counter!("repository_conflict_retries_total").increment(1);
            tracing::warn!(
                %stream,
                %expected_version,
                %error,
                "version conflict, retrying with any version"
            );
            Ok(store
                .append_to_stream(stream.as_str(), ExpectedVersion::Any, envelopes)
                .await?)
        }
        _ => Err(RepositoryError::from_append(error)),
    }
}

/// A save running in the background.
///
/// Resolves to the events that were written. The append proceeds whether
/// or not this is awaited; awaiting is the only way to observe its outcome.
pub struct PendingSave<E> {
    inner: BoxFuture<'static, Result<Vec<E>>>,
}

impl<E: Send + 'static> PendingSave<E> {
    fn ready(events: Vec<E>) -> Self {
        Self {
            inner: futures_util::future::ready(Ok(events)).boxed(),
        }
    }

    fn spawned(handle: JoinHandle<Result<WriteResult>>, events: Vec<E>) -> Self {
        Self {
            inner: handle
                .map(move |joined| -> Result<Vec<E>> {
                    joined??;
                    Ok(events)
                })
                .boxed(),
        }
    }
}

impl<E> Future for PendingSave<E> {
    type Output = Result<Vec<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<E> std::fmt::Debug for PendingSave<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSave").finish_non_exhaustive()
    }
}

/// Builder for [`Repository`].
pub struct RepositoryBuilder<S> {
    store: S,
    config: RepositoryConfig,
    registry: EventRegistry,
    metadata: Option<StreamMetadata>,
}

impl<S> RepositoryBuilder<S>
where
    S: StreamStore + Clone + 'static,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: RepositoryConfig::default(),
            registry: EventRegistry::new(),
            metadata: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn category(mut self, category: impl Into<Category>) -> Self {
        self.config.category = category.into();
        self
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.config.conflict_policy = policy;
        self
    }

    /// Sets the page size of the single read behind `get_by_id`. Zero is
    /// treated as one.
    pub fn read_page_size(mut self, size: usize) -> Self {
        self.config.read_page_size = size.max(1);
        self
    }

    /// Writes `metadata` to every saved stream's metadata stream.
    pub fn metadata(mut self, metadata: StreamMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Expected version of the metadata stream for metadata writes
    /// (default: `ExpectedVersion::Any`).
    pub fn metastream_expected_version(mut self, expected: ExpectedVersion) -> Self {
        self.config.metastream_expected_version = expected;
        self
    }

    /// Uses a pre-populated registry, replacing any registrations made so far.
    pub fn registry(mut self, registry: EventRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers the event types of aggregate `A`.
    pub fn register<A: Aggregate>(mut self) -> Result<Self> {
        self.registry.register_aggregate::<A>()?;
        Ok(self)
    }

    /// Builds the repository. A zero `read_page_size` in the configuration
    /// is raised to one.
    pub fn build(self) -> Repository<S> {
        let mut config = self.config;
        config.read_page_size = config.read_page_size.max(1);

        let codec = EventCodec::new(config.category.clone(), Arc::new(self.registry));
        Repository {
            store: self.store,
            codec,
            metadata: self.metadata.map(Arc::new),
            config,
        }
    }
}
