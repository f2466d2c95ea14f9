// SQLite KvStore backend - shares the `kv_store`
// table from the controller's migration set. Values are JSON-encoded
// text; `sqlx::SqlitePool`'s own WAL concurrency gives this backend its
// concurrency story, so no extra in-process locking is needed here
// (unlike `infra-kv`'s memory/file backends, which wrap a Mutex).

use async_trait::async_trait;
use foreman_core::port::kv_store::Result;
use foreman_core::port::{KvError, KvStore};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn map_sqlx_error(err: sqlx::Error) -> KvError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("5") => {
            KvError::Transient(format!("database locked: {}", db_err.message()))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => KvError::Transient(err.to_string()),
        _ => KvError::Internal(err.to_string()),
    }
}

pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let dumped = serde_json::to_string(&value).map_err(|e| KvError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(dumped)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        match raw {
            Some(s) => Ok(Some(
                serde_json::from_str(&s).map_err(|e| KvError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM kv_store")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }

    async fn push(&self, value: serde_json::Value) -> Result<String> {
        let dumped = serde_json::to_string(&value).map_err(|e| KvError::Serialization(e.to_string()))?;
        loop {
            let key = Uuid::new_v4().to_string();
            let result = sqlx::query("INSERT INTO kv_store (key, value) VALUES (?, ?)")
                .bind(&key)
                .bind(&dumped)
                .execute(&self.pool)
                .await;
            match result {
                Ok(_) => return Ok(key),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => continue,
                Err(e) => return Err(map_sqlx_error(e)),
            }
        }
    }

    async fn next(&self, pop: bool) -> Result<Option<(String, serde_json::Value)>> {
        if pop {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
            let row = sqlx::query("SELECT key, value FROM kv_store LIMIT 1")
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            let row = match row {
                Some(r) => r,
                None => {
                    tx.commit().await.map_err(map_sqlx_error)?;
                    return Ok(None);
                }
            };
            let key: String = row.get("key");
            let raw: String = row.get("value");
            sqlx::query("DELETE FROM kv_store WHERE key = ?")
                .bind(&key)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            tx.commit().await.map_err(map_sqlx_error)?;
            let value = serde_json::from_str(&raw).map_err(|e| KvError::Serialization(e.to_string()))?;
            Ok(Some((key, value)))
        } else {
            let row = sqlx::query("SELECT key, value FROM kv_store LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            match row {
                Some(row) => {
                    let key: String = row.get("key");
                    let raw: String = row.get("value");
                    let value =
                        serde_json::from_str(&raw).map_err(|e| KvError::Serialization(e.to_string()))?;
                    Ok(Some((key, value)))
                }
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn store() -> SqliteKvStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteKvStore::new(pool)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = store().await;
        store.write("a", serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), Some(serde_json::json!({"n": 1})));
    }

    #[tokio::test]
    async fn push_then_pop_atomically_removes() {
        let store = store().await;
        let key = store.push(serde_json::json!(42)).await.unwrap();
        let (k, v) = store.next(true).await.unwrap().unwrap();
        assert_eq!(k, key);
        assert_eq!(v, serde_json::json!(42));
        assert!(store.next(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_absent_key_is_not_an_error() {
        let store = store().await;
        assert!(store.delete("missing").await.is_ok());
    }
}
