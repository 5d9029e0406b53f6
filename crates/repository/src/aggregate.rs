//! Core aggregate and domain event traits.

use common::AggregateId;
use serde::{Deserialize, Serialize};
use stream_store::ExpectedVersion;

use crate::registry::{EventRegistry, RegistryError};

/// Number of events committed to an aggregate's stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Creates a new version from a raw event count.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of an aggregate with no history.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version after `count` more events are committed.
    pub fn advance(&self, count: usize) -> Self {
        Self(self.0 + count as u64)
    }

    /// Returns the raw event count.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Translates the event count into the storage expectation for the next
    /// append: no history means the stream must not exist, otherwise the
    /// last committed position (`count - 1`).
    pub fn expected_version(&self) -> ExpectedVersion {
        match self.0 {
            0 => ExpectedVersion::NoStream,
            count => ExpectedVersion::Exact(count - 1),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain. An
/// aggregate's event type is usually an enum with one variant per fact;
/// serialize it with `#[serde(untagged)]` so that only the variant's fields
/// are written as the payload, since the type travels in the headers.
pub trait DomainEvent: Serialize + Send + Sync + Clone + 'static {
    /// Returns the logical type identifier written to the `eventTypeId`
    /// header, e.g. `"orders.ItemAdded"`.
    fn event_type_id(&self) -> &'static str;

    /// Registers a decoder for every logical type this event family carries.
    fn register_types(registry: &mut EventRegistry) -> Result<(), RegistryError>;
}

/// Identity, committed version and pending events of an aggregate.
///
/// Aggregates embed one of these and expose it through
/// [`Aggregate::root`] / [`Aggregate::root_mut`]. The id is fixed at
/// construction; only replay assigns it afterwards.
///
/// ```compile_fail
/// use repository::{AggregateId, AggregateRoot};
///
/// let mut root: AggregateRoot<()> = AggregateRoot::new(AggregateId::from("42"));
/// root.set_id(AggregateId::from("43"));
/// ```
#[derive(Debug, Clone)]
pub struct AggregateRoot<E> {
    id: AggregateId,
    version: Version,
    uncommitted: Vec<E>,
}

impl<E> Default for AggregateRoot<E> {
    fn default() -> Self {
        Self {
            id: AggregateId::default(),
            version: Version::initial(),
            uncommitted: Vec::new(),
        }
    }
}

impl<E> AggregateRoot<E> {
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: AggregateId) {
        self.id = id;
    }

    /// Events already committed to the stream, as far as this instance knows.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn uncommitted(&self) -> &[E] {
        &self.uncommitted
    }

    /// Queues a newly raised event.
    pub fn record(&mut self, event: E) {
        self.uncommitted.push(event);
    }

    /// Counts one replayed event as committed.
    pub fn mark_replayed(&mut self) {
        self.version = self.version.advance(1);
    }

    /// Drains the pending events and counts them as committed.
    pub fn commit(&mut self) -> Vec<E> {
        let events = std::mem::take(&mut self.uncommitted);
        self.version = self.version.advance(events.len());
        events
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Raise new events from business operations
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + Sized + 'static {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    ///
    /// Part of the stream name, so it must never change once data exists.
    fn aggregate_type() -> &'static str;

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic and must not fail:
    /// events represent facts that have happened.
    fn apply(&mut self, event: &Self::Event);

    /// Returns the aggregate's identifier.
    fn id(&self) -> &AggregateId {
        self.root().id()
    }

    /// Returns the number of events known to be committed.
    fn version(&self) -> Version {
        self.root().version()
    }

    /// Returns events raised since the last save, oldest first.
    fn uncommitted_events(&self) -> &[Self::Event] {
        self.root().uncommitted()
    }

    /// Applies a new event and queues it for the next save.
    fn raise(&mut self, event: Self::Event) {
        self.apply(&event);
        self.root_mut().record(event);
    }

    /// Applies a stored event during replay.
    fn replay(&mut self, event: Self::Event) {
        self.apply(&event);
        self.root_mut().mark_replayed();
    }

    /// Clears the pending queue after a successful write and returns the
    /// events that were written.
    fn mark_committed(&mut self) -> Vec<Self::Event> {
        self.root_mut().commit()
    }
}
