use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event envelope.
///
/// A fresh ID is generated for every envelope. The store may use it to
/// recognise a replayed append of the same envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Version a writer expects a stream to be at when appending.
///
/// Positions are 0-based: a stream holding three events is at `Exact(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Append regardless of the current stream state.
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The last event in the stream must be at this position.
    Exact(u64),
}

impl ExpectedVersion {
    /// Checks the expectation against the position of the last event in a
    /// stream (`None` when the stream does not exist).
    pub fn matches(&self, current: Option<u64>) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => current.is_none(),
            ExpectedVersion::Exact(expected) => current == Some(*expected),
        }
    }
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("any"),
            ExpectedVersion::NoStream => f.write_str("no stream"),
            ExpectedVersion::Exact(position) => write!(f, "{position}"),
        }
    }
}

/// An event ready to be appended: the persisted unit of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    /// Unique identifier for this envelope.
    pub event_id: EventId,

    /// Short type name (e.g. "ItemAdded").
    pub event_type: String,

    /// Whether `data` holds JSON.
    pub is_json: bool,

    /// The serialized event payload.
    pub data: Vec<u8>,

    /// Serialized headers describing the payload.
    pub metadata: Vec<u8>,
}

impl EventData {
    /// Creates a new event data builder.
    pub fn builder() -> EventDataBuilder {
        EventDataBuilder::default()
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventDataBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    is_json: bool,
    data: Option<Vec<u8>>,
    metadata: Vec<u8>,
}

impl EventDataBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the payload from a serializable value and flags it as JSON.
    pub fn json_data<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.data = Some(serde_json::to_vec(payload)?);
        self.is_json = true;
        Ok(self)
    }

    /// Sets the payload from raw bytes.
    pub fn data(mut self, data: Vec<u8>, is_json: bool) -> Self {
        self.data = Some(data);
        self.is_json = is_json;
        self
    }

    /// Sets the serialized headers.
    pub fn metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Tries to build the envelope, returning None if the type or payload is missing.
    pub fn try_build(self) -> Option<EventData> {
        Some(EventData {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type?,
            is_json: self.is_json,
            data: self.data?,
            metadata: self.metadata,
        })
    }
}

/// An event as read back from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Stream the event belongs to.
    pub stream: String,

    /// 0-based position of the event within its stream.
    pub event_number: u64,

    pub event_id: EventId,
    pub event_type: String,
    pub is_json: bool,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,

    /// When the store accepted the event.
    pub created: DateTime<Utc>,
}

impl RecordedEvent {
    /// Records an envelope at a stream position.
    pub fn from_event_data(
        stream: impl Into<String>,
        event_number: u64,
        event: EventData,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            stream: stream.into(),
            event_number,
            event_id: event.event_id,
            event_type: event.event_type,
            is_json: event.is_json,
            data: event.data,
            metadata: event.metadata,
            created,
        }
    }
}
