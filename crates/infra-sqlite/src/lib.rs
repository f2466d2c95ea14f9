// Foreman Infrastructure - SQLite Adapter
// Implements: Controller (registry/queue/locks/messages) and the SQLite
// KvStore backend, sharing one connection pool and migration set.

mod connection;
mod controller;
mod kv_store;
mod migration;

pub use connection::create_pool;
pub use controller::SqliteController;
pub use kv_store::SqliteKvStore;
pub use migration::run_migrations;
