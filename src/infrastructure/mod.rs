pub mod core;
pub mod crypto;
pub mod host_metrics;
pub mod observability;
pub mod persistence;
pub mod repositories;
pub mod rpc;
pub mod transport;

pub use persistence::SqlStorage;
pub use repositories::{FileSnapshotStorage, InMemoryStorage, KeyValueStorage};
