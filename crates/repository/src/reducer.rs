//! Replays stored events onto a fresh aggregate.

use common::AggregateId;

use crate::aggregate::Aggregate;

/// Builds an aggregate by applying `events` in the order given.
///
/// Every event counts as committed; nothing is reordered, skipped or
/// deduplicated.
pub fn reduce<A: Aggregate>(id: AggregateId, events: impl IntoIterator<Item = A::Event>) -> A {
    let mut aggregate = A::default();
    aggregate.root_mut().set_id(id);
    for event in events {
        aggregate.replay(event);
    }
    aggregate
}

/// Like [`reduce`], but over lazily decoded events; stops at the first error.
pub fn try_reduce<A, E>(
    id: AggregateId,
    events: impl IntoIterator<Item = Result<A::Event, E>>,
) -> Result<A, E>
where
    A: Aggregate,
{
    let mut aggregate = A::default();
    aggregate.root_mut().set_id(id);
    for event in events {
        aggregate.replay(event?);
    }
    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateRoot, DomainEvent, Version};
    use crate::registry::{EventRegistry, RegistryError};
    use serde::Serialize;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Pushed(u32);

    impl DomainEvent for Pushed {
        fn event_type_id(&self) -> &'static str {
            "test.Pushed"
        }

        fn register_types(registry: &mut EventRegistry) -> Result<(), RegistryError> {
            registry.register("test.Pushed", Pushed)
        }
    }

    #[derive(Debug, Default)]
    struct Log {
        root: AggregateRoot<Pushed>,
        entries: Vec<u32>,
    }

    impl Aggregate for Log {
        type Event = Pushed;

        fn aggregate_type() -> &'static str {
            "Log"
        }

        fn root(&self) -> &AggregateRoot<Pushed> {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot<Pushed> {
            &mut self.root
        }

        fn apply(&mut self, event: &Pushed) {
            self.entries.push(event.0);
        }
    }

    #[test]
    fn preserves_order() {
        let log: Log = reduce(AggregateId::from("l-1"), [3, 1, 2].map(Pushed));
        assert_eq!(log.entries, vec![3, 1, 2]);
        assert_eq!(log.version(), Version::new(3));
        assert_eq!(log.id().as_str(), "l-1");
        assert!(log.uncommitted_events().is_empty());
    }

    #[test]
    fn empty_history_yields_fresh_aggregate() {
        let log: Log = reduce(AggregateId::from("l-1"), []);
        assert!(log.entries.is_empty());
        assert_eq!(log.version(), Version::initial());
    }

    #[test]
    fn matches_in_memory_application() {
        let events: Vec<_> = (0..20).map(Pushed).collect();

        let mut direct = Log::default();
        for event in &events {
            direct.apply(event);
        }

        let replayed: Log = reduce(AggregateId::from("l-1"), events);
        assert_eq!(replayed.entries, direct.entries);
    }

    #[test]
    fn try_reduce_stops_at_first_error() {
        let events = vec![Ok(Pushed(1)), Err("boom"), Ok(Pushed(2))];
        let result = try_reduce::<Log, _>(AggregateId::from("l-1"), events);
        assert_eq!(result.unwrap_err(), "boom");
    }
}
