use crate::RecordedEvent;

/// Outcome of a forward read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceReadStatus {
    /// The stream exists; `events` holds the requested page.
    Success,
    /// No event has ever been written to the stream.
    StreamNotFound,
}

/// A page of events read forward from a stream.
#[derive(Debug, Clone)]
pub struct StreamEventsSlice {
    pub status: SliceReadStatus,

    /// Stream that was read.
    pub stream: String,

    /// Position the read started from.
    pub from_event_number: u64,

    /// Position to continue from for the next page.
    pub next_event_number: u64,

    /// Position of the last event in the stream at read time.
    pub last_event_number: Option<u64>,

    /// True if no events follow this page.
    pub is_end_of_stream: bool,

    /// Events in ascending stream order.
    pub events: Vec<RecordedEvent>,
}

impl StreamEventsSlice {
    /// Builds the slice returned for a stream that does not exist.
    pub fn not_found(stream: impl Into<String>, from_event_number: u64) -> Self {
        Self {
            status: SliceReadStatus::StreamNotFound,
            stream: stream.into(),
            from_event_number,
            next_event_number: from_event_number,
            last_event_number: None,
            is_end_of_stream: true,
            events: Vec::new(),
        }
    }

    /// Builds a successful slice from a page of events and the stream's
    /// last position.
    pub fn found(
        stream: impl Into<String>,
        from_event_number: u64,
        last_event_number: u64,
        events: Vec<RecordedEvent>,
    ) -> Self {
        let next_event_number = events
            .last()
            .map(|e| e.event_number + 1)
            .unwrap_or(from_event_number);
        Self {
            status: SliceReadStatus::Success,
            stream: stream.into(),
            from_event_number,
            next_event_number,
            last_event_number: Some(last_event_number),
            is_end_of_stream: next_event_number > last_event_number,
            events,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == SliceReadStatus::Success
    }
}
