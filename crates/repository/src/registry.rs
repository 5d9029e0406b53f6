//! Explicit mapping from logical event type identifiers to decoders.
//!
//! Stored events carry their type as a string header. The registry is
//! filled once at start-up and consulted on every read to turn a
//! `(type id, payload)` pair back into the aggregate's event type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::codec::CodecError;

type DecodeFn =
    Arc<dyn Fn(&[u8]) -> Result<Box<dyn Any + Send>, serde_json::Error> + Send + Sync>;

/// Errors raised while populating an [`EventRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Event type '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Event type identifier must not be empty")]
    EmptyTypeId,
}

struct Registration {
    family: TypeId,
    family_name: &'static str,
    decode: DecodeFn,
}

/// Maps logical event type identifiers to payload decoders.
#[derive(Default)]
pub struct EventRegistry {
    registrations: HashMap<String, Registration>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the payload type `T` under `type_id`; `wrap` lifts a
    /// decoded payload into the event family `E` (typically an enum variant
    /// constructor).
    pub fn register<E, T>(&mut self, type_id: &str, wrap: fn(T) -> E) -> Result<(), RegistryError>
    where
        E: DomainEvent,
        T: DeserializeOwned + 'static,
    {
        if type_id.is_empty() {
            return Err(RegistryError::EmptyTypeId);
        }
        if self.registrations.contains_key(type_id) {
            return Err(RegistryError::AlreadyRegistered(type_id.to_string()));
        }

        let decode: DecodeFn = Arc::new(move |payload: &[u8]| {
            let value: T = serde_json::from_slice(payload)?;
            Ok(Box::new(wrap(value)) as Box<dyn Any + Send>)
        });

        self.registrations.insert(
            type_id.to_string(),
            Registration {
                family: TypeId::of::<E>(),
                family_name: std::any::type_name::<E>(),
                decode,
            },
        );
        Ok(())
    }

    /// Registers every type of the event family `E`.
    pub fn register_events<E: DomainEvent>(&mut self) -> Result<(), RegistryError> {
        E::register_types(self)
    }

    /// Registers the event family of aggregate `A`.
    pub fn register_aggregate<A: Aggregate>(&mut self) -> Result<(), RegistryError> {
        self.register_events::<A::Event>()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.registrations.contains_key(type_id)
    }

    /// Returns all registered type identifiers, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.registrations.keys().cloned().collect();
        types.sort();
        types
    }

    /// Decodes `payload` as the event registered under `type_id`.
    ///
    /// An id registered for a different event family is treated as unknown.
    pub(crate) fn decode<E: DomainEvent>(
        &self,
        type_id: &str,
        payload: &[u8],
    ) -> Result<E, CodecError> {
        let registration = self
            .registrations
            .get(type_id)
            .filter(|r| r.family == TypeId::of::<E>())
            .ok_or_else(|| CodecError::UnknownEventType {
                event_type: type_id.to_string(),
            })?;

        let decoded = (registration.decode)(payload).map_err(|source| {
            CodecError::MalformedPayload {
                event_type: type_id.to_string(),
                source,
            }
        })?;

        decoded
            .downcast::<E>()
            .map(|event| *event)
            .map_err(|_| CodecError::UnknownEventType {
                event_type: type_id.to_string(),
            })
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (type_id, registration) in &self.registrations {
            map.entry(type_id, &registration.family_name);
        }
        map.finish()
    }
}
