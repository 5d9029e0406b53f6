//! Identity types shared by the stream store and the repository.

mod types;

pub use types::{AggregateId, Category};
