//! Stream addressing: `{category}-{aggregate type}-{aggregate id}`.

use common::{AggregateId, Category};
use stream_store::metadata_stream_name;

/// Name of the stream holding one aggregate instance's history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamName(String);

impl StreamName {
    /// Derives the stream for an aggregate instance.
    ///
    /// Pure and deterministic: this is the only way an aggregate's history
    /// is located, so the output for a given triple must never change.
    /// Callers must pass a non-empty type name and id.
    pub fn for_aggregate(category: &Category, aggregate_type: &str, id: &AggregateId) -> Self {
        Self(format!("{category}-{aggregate_type}-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the metadata stream attached to this stream.
    pub fn metadata_stream(&self) -> String {
        metadata_stream_name(&self.0)
    }
}

impl std::fmt::Display for StreamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`StreamName::for_aggregate`].
pub fn stream_name(category: &Category, aggregate_type: &str, id: &AggregateId) -> StreamName {
    StreamName::for_aggregate(category, aggregate_type, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_category_type_and_id() {
        let name = stream_name(&Category::from("orders"), "Order", &AggregateId::from("42"));
        assert_eq!(name.as_str(), "orders-Order-42");
        assert_eq!(name.to_string(), "orders-Order-42");
    }

    #[test]
    fn is_deterministic() {
        let category = Category::from("billing");
        let id = AggregateId::from("inv-9");
        assert_eq!(
            stream_name(&category, "Invoice", &id),
            stream_name(&category, "Invoice", &id)
        );
    }

    #[test]
    fn differs_per_component() {
        let id = AggregateId::from("1");
        let base = stream_name(&Category::from("orders"), "Order", &id);
        assert_ne!(base, stream_name(&Category::from("billing"), "Order", &id));
        assert_ne!(base, stream_name(&Category::from("orders"), "Cart", &id));
        assert_ne!(
            base,
            stream_name(&Category::from("orders"), "Order", &AggregateId::from("2"))
        );
    }

    #[test]
    fn metadata_stream_is_prefixed() {
        let name = stream_name(&Category::from("orders"), "Order", &AggregateId::from("42"));
        assert_eq!(name.metadata_stream(), "$$orders-Order-42");
    }
}
