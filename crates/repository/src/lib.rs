//! Event-sourced aggregate repository.
//!
//! This crate maps aggregates onto streams of a [`stream_store::StreamStore`]:
//! - [`Aggregate`] and [`DomainEvent`] traits for event-sourced entities
//! - [`EventRegistry`] and [`EventCodec`] for typed event envelopes
//! - [`Repository`] for loading by replay and saving with optimistic concurrency

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod error;
pub mod reducer;
pub mod registry;
pub mod repository;
pub mod stream_name;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, Version};
pub use codec::{CodecError, DOMAIN_HEADER, EVENT_TYPE_HEADER, EventCodec, EventHeaders};
pub use config::{ConflictPolicy, DEFAULT_READ_PAGE_SIZE, RepositoryConfig};
pub use error::{RepositoryError, Result};
pub use reducer::{reduce, try_reduce};
pub use registry::{EventRegistry, RegistryError};
pub use repository::{PendingSave, Repository, RepositoryBuilder};
pub use stream_name::{StreamName, stream_name};

pub use common::{AggregateId, Category};
