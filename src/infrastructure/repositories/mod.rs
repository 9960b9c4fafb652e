pub mod file_snapshot;
pub mod in_memory;
pub mod key_value;

pub use file_snapshot::FileSnapshotStorage;
pub use in_memory::InMemoryStorage;
pub use key_value::{InMemoryKeyValueStore, KeyValueStorage, KeyValueStore, RedisKeyValueStore};
