//! Durable whole-document JSON snapshots for store configuration and run
//! progress.
//!
//! Both stores follow the same pattern: the full mapping is loaded, one entry
//! is merged, and the whole document is rewritten. Rewrites go through a
//! sibling temp file and a rename so readers never observe a half-written
//! file. Read-modify-write sequences serialize on an async mutex per store
//! object; without it, concurrent saves for different stores would silently
//! drop each other's entries. One physical file per store would remove the
//! contention entirely, but a single snapshot keeps the on-disk layout
//! trivially inspectable and the mapping is small.

use crate::model::{ProgressRecord, StoreConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

/// Load a snapshot, treating a missing or corrupt file as an empty mapping.
fn load_snapshot<T: DeserializeOwned>(path: &Path) -> HashMap<String, T> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_slice(&data) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot unreadable, starting empty");
            HashMap::new()
        }
    }
}

/// Write the full mapping atomically: temp file, flush, rename over target.
fn write_snapshot<T: Serialize>(path: &Path, map: &HashMap<String, T>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        let data = serde_json::to_vec_pretty(map)?;
        f.write_all(&data)?;
        f.flush()?;
    }
    std::fs::rename(&tmp, path)
}

/// Durable per-store run statistics.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub async fn load(&self) -> HashMap<String, ProgressRecord> {
        let _guard = self.lock.lock().await;
        load_snapshot(&self.path)
    }

    pub async fn get(&self, store: &str) -> Option<ProgressRecord> {
        let _guard = self.lock.lock().await;
        load_snapshot::<ProgressRecord>(&self.path).remove(store)
    }

    /// Merge one store's record and rewrite the snapshot.
    pub async fn save(&self, store: &str, record: ProgressRecord) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = load_snapshot::<ProgressRecord>(&self.path);
        map.insert(store.to_string(), record);
        write_snapshot(&self.path, &map)
    }

    /// Remove one store's record; no-op when absent.
    pub async fn delete(&self, store: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = load_snapshot::<ProgressRecord>(&self.path);
        if map.remove(store).is_some() {
            write_snapshot(&self.path, &map)?;
        }
        Ok(())
    }
}

/// Store name -> endpoint and credentials, same snapshot discipline.
#[derive(Debug)]
pub struct StoreConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StoreConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> HashMap<String, StoreConfig> {
        let _guard = self.lock.lock().await;
        load_snapshot(&self.path)
    }

    pub async fn get(&self, store: &str) -> Option<StoreConfig> {
        let _guard = self.lock.lock().await;
        load_snapshot::<StoreConfig>(&self.path).remove(store)
    }

    pub async fn upsert(&self, store: &str, cfg: StoreConfig) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = load_snapshot::<StoreConfig>(&self.path);
        map.insert(store.to_string(), cfg);
        write_snapshot(&self.path, &map)
    }

    /// Returns whether an entry was actually removed.
    pub async fn delete(&self, store: &str) -> std::io::Result<bool> {
        let _guard = self.lock.lock().await;
        let mut map = load_snapshot::<StoreConfig>(&self.path);
        let existed = map.remove(store).is_some();
        if existed {
            write_snapshot(&self.path, &map)?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_rfc3339;

    fn record(total: u64, pending: u64) -> ProgressRecord {
        ProgressRecord {
            total_orders: total,
            pending_orders: pending,
            failed_submissions: 0,
            last_order_time: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_empty_and_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = ProgressStore::new(path);
        assert!(store.load().await.is_empty());

        // A save after corruption produces a clean snapshot again.
        store.save("alpha", record(10, 5)).await.unwrap();
        let map = store.load().await;
        assert_eq!(map["alpha"].total_orders, 10);
        assert_eq!(map["alpha"].pending_orders, 5);
    }

    #[tokio::test]
    async fn save_merges_without_clobbering_other_stores() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        store.save("alpha", record(4, 2)).await.unwrap();
        store.save("beta", record(9, 9)).await.unwrap();

        let map = store.load().await;
        assert_eq!(map.len(), 2);
        assert_eq!(map["alpha"].pending_orders, 2);
        assert_eq!(map["beta"].total_orders, 9);
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        store.save("alpha", record(4, 0)).await.unwrap();
        store.save("beta", record(6, 1)).await.unwrap();

        store.delete("alpha").await.unwrap();
        let map = store.load().await;
        assert!(!map.contains_key("alpha"));
        assert!(map.contains_key("beta"));

        // Deleting again is a no-op.
        store.delete("alpha").await.unwrap();
    }

    #[tokio::test]
    async fn config_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreConfigStore::new(dir.path().join("stores.json"));
        store
            .upsert(
                "alpha",
                StoreConfig {
                    store_url: "alpha.myshopify.com".into(),
                    api_key: "key".into(),
                    api_password: "pass".into(),
                },
            )
            .await
            .unwrap();

        let cfg = store.get("alpha").await.unwrap();
        assert_eq!(cfg.store_url, "alpha.myshopify.com");
        assert!(store.delete("alpha").await.unwrap());
        assert!(!store.delete("alpha").await.unwrap());
        assert!(store.get("alpha").await.is_none());
    }
}
