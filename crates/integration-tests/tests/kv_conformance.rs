//! Conformance suite run against every `KvStore` backend:
//! in-memory, on-disk JSON file, and SQLite. Each backend must satisfy
//! the same read/write/delete/push/next contract.

use foreman_core::port::KvStore;
use foreman_infra_kv::{JsonFileKvStore, MemoryKvStore};
use foreman_infra_sqlite::{create_pool, run_migrations, SqliteKvStore};
use serde_json::json;
use std::sync::Arc;

async fn sqlite_store() -> Arc<dyn KvStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteKvStore::new(pool))
}

fn memory_store() -> Arc<dyn KvStore> {
    Arc::new(MemoryKvStore::new())
}

fn json_file_store(dir: &tempfile::TempDir) -> Arc<dyn KvStore> {
    Arc::new(JsonFileKvStore::new(dir.path()).unwrap())
}

async fn write_then_read_round_trips(kv: Arc<dyn KvStore>) {
    kv.write("greeting", json!({"hello": "world"})).await.unwrap();
    let value = kv.read("greeting").await.unwrap();
    assert_eq!(value, Some(json!({"hello": "world"})));
}

async fn read_of_absent_key_is_none(kv: Arc<dyn KvStore>) {
    assert_eq!(kv.read("does-not-exist").await.unwrap(), None);
}

async fn write_is_idempotent_upsert(kv: Arc<dyn KvStore>) {
    kv.write("counter", json!(1)).await.unwrap();
    kv.write("counter", json!(2)).await.unwrap();
    assert_eq!(kv.read("counter").await.unwrap(), Some(json!(2)));
}

async fn delete_is_idempotent(kv: Arc<dyn KvStore>) {
    kv.write("transient", json!("x")).await.unwrap();
    kv.delete("transient").await.unwrap();
    assert_eq!(kv.read("transient").await.unwrap(), None);
    // deleting again must not error
    kv.delete("transient").await.unwrap();
}

async fn keys_lists_everything_written(kv: Arc<dyn KvStore>) {
    kv.write("a", json!(1)).await.unwrap();
    kv.write("b", json!(2)).await.unwrap();
    let mut keys = kv.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}

async fn push_mints_distinct_keys(kv: Arc<dyn KvStore>) {
    let k1 = kv.push(json!("first")).await.unwrap();
    let k2 = kv.push(json!("second")).await.unwrap();
    assert_ne!(k1, k2);
    assert_eq!(kv.read(&k1).await.unwrap(), Some(json!("first")));
    assert_eq!(kv.read(&k2).await.unwrap(), Some(json!("second")));
}

async fn next_without_pop_leaves_entry_in_place(kv: Arc<dyn KvStore>) {
    let key = kv.push(json!("stays")).await.unwrap();
    let (returned_key, value) = kv.next(false).await.unwrap().unwrap();
    assert_eq!(returned_key, key);
    assert_eq!(value, json!("stays"));
    // still there
    assert_eq!(kv.read(&key).await.unwrap(), Some(json!("stays")));
}

async fn next_with_pop_atomically_removes_the_entry(kv: Arc<dyn KvStore>) {
    let key = kv.push(json!("consumed")).await.unwrap();
    let (returned_key, value) = kv.next(true).await.unwrap().unwrap();
    assert_eq!(returned_key, key);
    assert_eq!(value, json!("consumed"));
    assert_eq!(kv.read(&key).await.unwrap(), None);
}

async fn next_on_empty_store_is_none(kv: Arc<dyn KvStore>) {
    assert_eq!(kv.next(true).await.unwrap(), None);
}

macro_rules! conformance_suite {
    ($backend_name:ident, $make:expr) => {
        mod $backend_name {
            use super::*;

            #[tokio::test]
            async fn write_then_read() {
                write_then_read_round_trips($make.await).await;
            }

            #[tokio::test]
            async fn read_absent() {
                read_of_absent_key_is_none($make.await).await;
            }

            #[tokio::test]
            async fn write_upsert() {
                write_is_idempotent_upsert($make.await).await;
            }

            #[tokio::test]
            async fn delete_idempotent() {
                delete_is_idempotent($make.await).await;
            }

            #[tokio::test]
            async fn keys_listed() {
                keys_lists_everything_written($make.await).await;
            }

            #[tokio::test]
            async fn push_distinct() {
                push_mints_distinct_keys($make.await).await;
            }

            #[tokio::test]
            async fn next_no_pop() {
                next_without_pop_leaves_entry_in_place($make.await).await;
            }

            #[tokio::test]
            async fn next_pop() {
                next_with_pop_atomically_removes_the_entry($make.await).await;
            }

            #[tokio::test]
            async fn next_empty() {
                next_on_empty_store_is_none($make.await).await;
            }
        }
    };
}

conformance_suite!(memory, async { memory_store() });
conformance_suite!(sqlite, sqlite_store());

#[tokio::test]
async fn json_file_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    write_then_read_round_trips(json_file_store(&dir)).await;
}

#[tokio::test]
async fn json_file_write_upsert() {
    let dir = tempfile::tempdir().unwrap();
    write_is_idempotent_upsert(json_file_store(&dir)).await;
}

#[tokio::test]
async fn json_file_delete_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    delete_is_idempotent(json_file_store(&dir)).await;
}

#[tokio::test]
async fn json_file_push_and_pop() {
    let dir = tempfile::tempdir().unwrap();
    let kv = json_file_store(&dir);
    push_mints_distinct_keys(kv.clone()).await;
    next_with_pop_atomically_removes_the_entry(json_file_store(&dir)).await;
}

#[tokio::test]
async fn json_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let kv = json_file_store(&dir);
        kv.write("durable", json!("value")).await.unwrap();
    }
    let kv = json_file_store(&dir);
    assert_eq!(kv.read("durable").await.unwrap(), Some(json!("value")));
}
