//! Transport adapters, one per destination type.

pub mod event_bus;
pub mod http;
pub mod object_store;
pub mod queue;
pub mod topic;

pub use event_bus::EventBusAdapter;
pub use http::{HttpAdapter, HttpDeliveryConfig};
pub use object_store::ObjectStoreAdapter;
pub use queue::QueueAdapter;
pub use topic::TopicAdapter;
