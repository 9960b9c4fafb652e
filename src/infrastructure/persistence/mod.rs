pub mod database;
pub mod sql_storage;

pub use database::Database;
pub use sql_storage::SqlStorage;
