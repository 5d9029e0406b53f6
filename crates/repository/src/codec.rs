//! Serialization contract between domain events and stored envelopes.
//!
//! An envelope carries the event's fields as a JSON payload and a header
//! map with at least:
//! - `eventTypeId`: the logical, fully qualified event type
//! - `domain`: the category of the repository that wrote it

use std::collections::HashMap;
use std::sync::Arc;

use common::Category;
use stream_store::{EventData, EventId, RecordedEvent};
use thiserror::Error;

use crate::aggregate::DomainEvent;
use crate::registry::EventRegistry;

/// Header naming the logical event type.
pub const EVENT_TYPE_HEADER: &str = "eventTypeId";

/// Header naming the category that wrote the event.
pub const DOMAIN_HEADER: &str = "domain";

/// Errors raised while encoding or decoding events.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The header's type identifier is not registered for this event family.
    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    /// The payload does not match the registered event shape.
    #[error("Malformed payload for event type {event_type}: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The headers are not a string map or lack the type identifier.
    #[error("Malformed event headers: {0}")]
    MalformedHeaders(String),

    /// The event could not be serialized.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String-to-string header map stored alongside each payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventHeaders(HashMap<String, String>);

impl EventHeaders {
    /// Builds the standard headers for an event written under `category`.
    pub fn new(event_type_id: &str, category: &Category) -> Self {
        let mut headers = HashMap::with_capacity(2);
        headers.insert(EVENT_TYPE_HEADER.to_string(), event_type_id.to_string());
        headers.insert(DOMAIN_HEADER.to_string(), category.to_string());
        Self(headers)
    }

    pub fn event_type_id(&self) -> Option<&str> {
        self.get(EVENT_TYPE_HEADER)
    }

    pub fn domain(&self) -> Option<&str> {
        self.get(DOMAIN_HEADER)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes)
            .map(Self)
            .map_err(|e| CodecError::MalformedHeaders(e.to_string()))
    }
}

impl From<HashMap<String, String>> for EventHeaders {
    fn from(headers: HashMap<String, String>) -> Self {
        Self(headers)
    }
}

/// Encodes domain events into envelopes and decodes them back.
#[derive(Debug, Clone)]
pub struct EventCodec {
    category: Category,
    registry: Arc<EventRegistry>,
}

impl EventCodec {
    pub fn new(category: Category, registry: Arc<EventRegistry>) -> Self {
        Self { category, registry }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Builds an envelope for `event` with a fresh event ID.
    pub fn encode<E: DomainEvent>(&self, event: &E) -> Result<EventData, CodecError> {
        let type_id = event.event_type_id();
        let headers = EventHeaders::new(type_id, &self.category);

        Ok(EventData {
            event_id: EventId::new(),
            event_type: short_type_name(type_id).to_string(),
            is_json: true,
            data: serde_json::to_vec(event)?,
            metadata: headers.to_bytes()?,
        })
    }

    /// Decodes a payload using the type named in `headers`.
    pub fn decode<E: DomainEvent>(
        &self,
        headers: &EventHeaders,
        payload: &[u8],
    ) -> Result<E, CodecError> {
        let type_id = headers.event_type_id().ok_or_else(|| {
            CodecError::MalformedHeaders(format!("missing '{EVENT_TYPE_HEADER}' header"))
        })?;
        self.registry.decode(type_id, payload)
    }

    /// Decodes an event read back from a stream.
    pub fn decode_recorded<E: DomainEvent>(&self, recorded: &RecordedEvent) -> Result<E, CodecError> {
        let headers = EventHeaders::from_bytes(&recorded.metadata)?;
        self.decode(&headers, &recorded.data)
    }
}

/// Last `.`-separated segment of a logical type id, used as the store's
/// short event type.
fn short_type_name(type_id: &str) -> &str {
    type_id.rsplit('.').next().unwrap_or(type_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ItemAdded {
        sku: String,
        quantity: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shipped {}

    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(untagged)]
    enum CartEvent {
        ItemAdded(ItemAdded),
        Shipped(Shipped),
    }

    impl DomainEvent for CartEvent {
        fn event_type_id(&self) -> &'static str {
            match self {
                CartEvent::ItemAdded(_) => "shop.cart.ItemAdded",
                CartEvent::Shipped(_) => "shop.cart.Shipped",
            }
        }

        fn register_types(registry: &mut EventRegistry) -> Result<(), RegistryError> {
            registry.register("shop.cart.ItemAdded", CartEvent::ItemAdded)?;
            registry.register("shop.cart.Shipped", CartEvent::Shipped)
        }
    }

    fn recorded(event: EventData) -> RecordedEvent {
        RecordedEvent::from_event_data("shop-Cart-1", 0, event, Default::default())
    }

    fn codec() -> EventCodec {
        let mut registry = EventRegistry::new();
        registry.register_events::<CartEvent>().unwrap();
        EventCodec::new(Category::from("shop"), Arc::new(registry))
    }

    fn item_added() -> CartEvent {
        CartEvent::ItemAdded(ItemAdded {
            sku: "SKU-1".to_string(),
            quantity: 2,
        })
    }

    #[test]
    fn encode_writes_fields_and_headers() {
        let envelope = codec().encode(&item_added()).unwrap();

        assert_eq!(envelope.event_type, "ItemAdded");
        assert!(envelope.is_json);

        let payload: serde_json::Value = serde_json::from_slice(&envelope.data).unwrap();
        assert_eq!(payload, serde_json::json!({"sku": "SKU-1", "quantity": 2}));

        let headers = EventHeaders::from_bytes(&envelope.metadata).unwrap();
        assert_eq!(headers.event_type_id(), Some("shop.cart.ItemAdded"));
        assert_eq!(headers.domain(), Some("shop"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn encode_generates_fresh_event_ids() {
        let codec = codec();
        let first = codec.encode(&item_added()).unwrap();
        let second = codec.encode(&item_added()).unwrap();
        assert_ne!(first.event_id, second.event_id);
    }

    #[test]
    fn decode_recorded_restores_event() {
        let codec = codec();
        let original = item_added();
        let decoded: CartEvent = codec
            .decode_recorded(&recorded(codec.encode(&original).unwrap()))
            .unwrap();
        assert_eq!(decoded, original);

        let shipped = CartEvent::Shipped(Shipped {});
        let decoded: CartEvent = codec
            .decode_recorded(&recorded(codec.encode(&shipped).unwrap()))
            .unwrap();
        assert_eq!(decoded, shipped);
    }

    #[test]
    fn decode_ignores_extra_headers() {
        let mut headers = EventHeaders::new("shop.cart.ItemAdded", &Category::from("shop"));
        headers.insert("correlationId", "abc");

        let decoded: CartEvent = codec()
            .decode(&headers, br#"{"sku":"SKU-1","quantity":2}"#)
            .unwrap();
        assert_eq!(decoded, item_added());
    }

    #[test]
    fn decode_unknown_type_fails() {
        let headers = EventHeaders::new("shop.cart.Abandoned", &Category::from("shop"));
        let result = codec().decode::<CartEvent>(&headers, b"{}");
        assert!(matches!(result, Err(CodecError::UnknownEventType { .. })));
    }

    #[test]
    fn decode_malformed_payload_fails() {
        let headers = EventHeaders::new("shop.cart.ItemAdded", &Category::from("shop"));
        let result = codec().decode::<CartEvent>(&headers, b"not json");
        assert!(matches!(result, Err(CodecError::MalformedPayload { .. })));
    }

    #[test]
    fn decode_without_type_header_fails() {
        let headers = EventHeaders::from(HashMap::from([(
            DOMAIN_HEADER.to_string(),
            "shop".to_string(),
        )]));
        let result = codec().decode::<CartEvent>(&headers, b"{}");
        assert!(matches!(result, Err(CodecError::MalformedHeaders(_))));
    }

    #[test]
    fn headers_must_be_a_string_map() {
        assert!(matches!(
            EventHeaders::from_bytes(br#"{"eventTypeId": 5}"#),
            Err(CodecError::MalformedHeaders(_))
        ));
        assert!(EventHeaders::from_bytes(b"[]").is_err());
    }

    #[test]
    fn short_type_name_takes_last_segment() {
        assert_eq!(short_type_name("shop.cart.ItemAdded"), "ItemAdded");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
