//! Shared fixtures for repository integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use repository::{
    Aggregate, AggregateId, AggregateRoot, DomainEvent, EventRegistry, RegistryError, Repository,
};
use serde::{Deserialize, Serialize};
use stream_store::{
    ExpectedVersion, InMemoryStreamStore, StoreError, StreamEventsSlice, StreamMetadata,
    StreamMetadataResult, StreamStore, WriteResult,
};

pub const CATEGORY: &str = "orders";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub customer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OrderEvent {
    Created(OrderCreated),
    ItemAdded(ItemAdded),
}

impl DomainEvent for OrderEvent {
    fn event_type_id(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "orders.OrderCreated",
            OrderEvent::ItemAdded(_) => "orders.ItemAdded",
        }
    }

    fn register_types(registry: &mut EventRegistry) -> Result<(), RegistryError> {
        registry.register("orders.OrderCreated", OrderEvent::Created)?;
        registry.register("orders.ItemAdded", OrderEvent::ItemAdded)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Order {
    root: AggregateRoot<OrderEvent>,
    pub customer: Option<String>,
    pub items: Vec<(String, u32)>,
}

impl Order {
    pub fn create(id: impl Into<AggregateId>, customer: &str) -> Self {
        let mut order = Order {
            root: AggregateRoot::new(id.into()),
            ..Order::default()
        };
        order.raise(OrderEvent::Created(OrderCreated {
            customer: customer.to_string(),
        }));
        order
    }

    pub fn add_item(&mut self, sku: &str, quantity: u32) {
        self.raise(OrderEvent::ItemAdded(ItemAdded {
            sku: sku.to_string(),
            quantity,
        }));
    }
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn root(&self) -> &AggregateRoot<OrderEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<OrderEvent> {
        &mut self.root
    }

    fn apply(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::Created(created) => self.customer = Some(created.customer.clone()),
            OrderEvent::ItemAdded(item) => self.items.push((item.sku.clone(), item.quantity)),
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("repository=debug,stream_store=debug")
        .try_init();
}

/// In-memory repository for the `orders` category with `Order` registered.
pub fn order_repository(store: InMemoryStreamStore) -> Repository<InMemoryStreamStore> {
    init_tracing();
    Repository::builder(store)
        .category(CATEGORY)
        .register::<Order>()
        .expect("order events register once")
        .build()
}

/// Which store calls a [`FaultyStore`] rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Reads,
    Appends,
    Metadata,
}

/// Wraps the in-memory store and fails one kind of call with a transport error.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: InMemoryStreamStore,
    fault: Option<Fault>,
}

impl FaultyStore {
    pub fn failing(fault: Fault) -> Self {
        Self {
            inner: InMemoryStreamStore::new(),
            fault: Some(fault),
        }
    }

    fn check(&self, fault: Fault) -> stream_store::Result<()> {
        if self.fault == Some(fault) {
            return Err(StoreError::Transport("connection reset by peer".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StreamStore for FaultyStore {
    async fn read_stream_events_forward(
        &self,
        stream: &str,
        start: u64,
        max_count: usize,
    ) -> stream_store::Result<StreamEventsSlice> {
        self.check(Fault::Reads)?;
        self.inner
            .read_stream_events_forward(stream, start, max_count)
            .await
    }

    async fn append_to_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: Vec<stream_store::EventData>,
    ) -> stream_store::Result<WriteResult> {
        self.check(Fault::Appends)?;
        self.inner
            .append_to_stream(stream, expected_version, events)
            .await
    }

    async fn set_stream_metadata(
        &self,
        stream: &str,
        expected_metastream_version: ExpectedVersion,
        metadata: &StreamMetadata,
    ) -> stream_store::Result<WriteResult> {
        self.inner
            .set_stream_metadata(stream, expected_metastream_version, metadata)
            .await?;
        self.check(Fault::Metadata)?;
        Ok(WriteResult {
            next_expected_version: 0,
        })
    }

    async fn get_stream_metadata(
        &self,
        stream: &str,
    ) -> stream_store::Result<Option<StreamMetadataResult>> {
        self.inner.get_stream_metadata(stream).await
    }
}

/// Waits until the store has seen `count` metadata writes.
pub async fn wait_for_metadata_writes(store: &InMemoryStreamStore, count: usize) {
    for _ in 0..200 {
        if store.metadata_calls() >= count {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!(
        "expected {count} metadata writes, saw {}",
        store.metadata_calls()
    );
}
