// Key-Value Store port - shared substrate for queues and ad-hoc registries
//
// Implementations: `infra-kv::MemoryKvStore`, `infra-kv::JsonFileKvStore`,
// `infra-sqlite::SqliteKvStore`, `api-http::HttpKvStore`.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transient transport error: {0}")]
    Transient(String),

    #[error("internal key-value store error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Idempotent upsert.
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Idempotent; deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;

    /// Atomically mint a fresh key (retrying on collision) and write
    /// `value` under it, returning the minted key.
    async fn push(&self, value: serde_json::Value) -> Result<String>;

    /// Return any one element. If `pop` is true, the read and the
    /// delete happen atomically with respect to concurrent callers.
    async fn next(&self, pop: bool) -> Result<Option<(String, serde_json::Value)>>;
}
