// On-disk JSON-file KV store: one file per record,
// named by the hex MD5 digest of the key. Carried over from the
// original `disk.py` backend: readers lazily load on demand and cache,
// `keys()` scans the directory and merges with the cache, and corrupt
// files (unparseable JSON, or a `key` field that doesn't match the
// computed key) are skipped silently rather than surfaced as errors.

use foreman_core::port::kv_store::Result;
use foreman_core::port::{KvError, KvStore};
use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: serde_json::Value,
}

pub struct JsonFileKvStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, serde_json::Value>>,
}

impl JsonFileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Md5::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.dir.join(digest)
    }

    fn load_file(path: &Path, expected_key: &str) -> Option<serde_json::Value> {
        let bytes = std::fs::read(path).ok()?;
        let record: Record = serde_json::from_slice(&bytes).ok()?;
        if record.key != expected_key {
            return None;
        }
        Some(record.value)
    }

    fn write_file(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let record = Record {
            key: key.to_string(),
            value: value.clone(),
        };
        let bytes =
            serde_json::to_vec(&record).map_err(|e| KvError::Serialization(e.to_string()))?;
        std::fs::write(self.path_for(key), bytes).map_err(|e| KvError::Io(e.to_string()))
    }

    /// Scan the directory for every file whose name is a valid key
    /// record, skipping anything corrupt or mismatched. Used by `keys`
    /// and `next` to discover entries the in-memory cache hasn't seen.
    fn scan_disk(&self) -> Result<HashMap<String, serde_json::Value>> {
        let mut found = HashMap::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|e| KvError::Io(e.to_string()))?;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(_) => continue,
            };
            let record: Record = match serde_json::from_slice(&bytes) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let expected_name = {
                let mut hasher = Md5::new();
                hasher.update(record.key.as_bytes());
                hex::encode(hasher.finalize())
            };
            let actual_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if actual_name != expected_name {
                continue;
            }
            found.insert(record.key, record.value);
        }
        Ok(found)
    }
}

#[async_trait]
impl KvStore for JsonFileKvStore {
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.write_file(key, &value)?;
        let mut cache = self.cache.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        cache.insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>> {
        {
            let cache = self.cache.lock().map_err(|e| KvError::Internal(e.to_string()))?;
            if let Some(v) = cache.get(key) {
                return Ok(Some(v.clone()));
            }
        }
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        match Self::load_file(&path, key) {
            Some(value) => {
                let mut cache = self.cache.lock().map_err(|e| KvError::Internal(e.to_string()))?;
                cache.insert(key.to_string(), value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| KvError::Io(e.to_string()))?;
        }
        let mut cache = self.cache.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        cache.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let disk = self.scan_disk()?;
        let mut cache = self.cache.lock().map_err(|e| KvError::Internal(e.to_string()))?;
        for (k, v) in disk {
            cache.entry(k).or_insert(v);
        }
        Ok(cache.keys().cloned().collect())
    }

    async fn push(&self, value: serde_json::Value) -> Result<String> {
        loop {
            let key = Uuid::new_v4().to_string();
            let path = self.path_for(&key);
            if !path.exists() {
                self.write(&key, value).await?;
                return Ok(key);
            }
        }
    }

    async fn next(&self, pop: bool) -> Result<Option<(String, serde_json::Value)>> {
        let key = {
            let keys = self.keys().await?;
            match keys.into_iter().next() {
                Some(k) => k,
                None => return Ok(None),
            }
        };
        let value = match self.read(&key).await? {
            Some(v) => v,
            None => return Ok(None),
        };
        if pop {
            self.delete(&key).await?;
        }
        Ok(Some((key, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let store = JsonFileKvStore::new(dir.path()).unwrap();
        store.write("alpha", serde_json::json!({"n": 1})).await.unwrap();
        let reopened = JsonFileKvStore::new(dir.path()).unwrap();
        assert_eq!(
            reopened.read("alpha").await.unwrap(),
            Some(serde_json::json!({"n": 1}))
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped_silently() {
        let dir = tempdir().unwrap();
        let store = JsonFileKvStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("garbage"), b"not json").unwrap();
        assert_eq!(store.keys().await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn filename_is_hex_md5_of_key() {
        let dir = tempdir().unwrap();
        let store = JsonFileKvStore::new(dir.path()).unwrap();
        store.write("beta", serde_json::json!(1)).await.unwrap();
        let mut hasher = Md5::new();
        hasher.update(b"beta");
        let expected = hex::encode(hasher.finalize());
        assert!(dir.path().join(expected).exists());
    }
}
