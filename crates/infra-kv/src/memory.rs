use foreman_core::port::kv_store::Result;
use foreman_core::port::{KvError, KvStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Pure in-process store, good for tests and single-binary deployments.
/// All operations serialize on one `Mutex`, so `push`/`next(pop=true)`
/// are trivially atomic with respect to every other operation.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let entries = self.entries.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        Ok(entries.keys().cloned().collect())
    }

    async fn push(&self, value: serde_json::Value) -> Result<String> {
        let mut entries = self.entries.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        loop {
            let key = Uuid::new_v4().to_string();
            if !entries.contains_key(&key) {
                entries.insert(key.clone(), value);
                return Ok(key);
            }
        }
    }

    async fn next(&self, pop: bool) -> Result<Option<(String, serde_json::Value)>> {
        let mut entries = self.entries.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        let key = match entries.keys().next().cloned() {
            Some(k) => k,
            None => return Ok(None),
        };
        if pop {
            let value = entries.remove(&key).expect("key just observed present");
            Ok(Some((key, value)))
        } else {
            let value = entries.get(&key).cloned().expect("key just observed present");
            Ok(Some((key, value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_then_pop_round_trips() {
        let store = MemoryKvStore::new();
        let key = store.push(serde_json::json!({"a": 1})).await.unwrap();
        let (k, v) = store.next(true).await.unwrap().unwrap();
        assert_eq!(k, key);
        assert_eq!(v, serde_json::json!({"a": 1}));
        assert!(store.next(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_absent_key_is_not_an_error() {
        let store = MemoryKvStore::new();
        assert!(store.delete("missing").await.is_ok());
    }

    #[tokio::test]
    async fn next_without_pop_leaves_entry_in_place() {
        let store = MemoryKvStore::new();
        store.write("k", serde_json::json!(1)).await.unwrap();
        let (k, _) = store.next(false).await.unwrap().unwrap();
        assert_eq!(k, "k");
        assert!(store.read("k").await.unwrap().is_some());
    }
}
