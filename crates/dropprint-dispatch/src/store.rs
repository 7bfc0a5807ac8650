// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Object store gateway.
//
// The pipeline only needs three things from the remote store: list what is
// there, fetch one object, delete one object.  Which bucket, region and
// credentials are used is decided when a backend is constructed.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use dropprint_core::error::{DropprintError, Result};

/// One entry of a store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Remote blob store holding uploaded documents.
///
/// All implementations must be `Send + Sync` so the controller task can own
/// them behind an `Arc`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every object, in the store's own order.
    async fn list(&self) -> Result<Vec<ObjectInfo>>;

    /// Fetch the full contents of `key`.  A missing key is an error.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store that keeps insertion order.
///
/// Useful for tests and demos.  Failures can be injected per operation to
/// exercise the pipeline's retry paths.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    fail_next_get: Mutex<HashSet<String>>,
    get_counts: Mutex<HashMap<String, usize>>,
    fail_deletes: AtomicBool,
    fail_list: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object.  A replaced object keeps its position.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        let key = key.into();
        let data = data.into();
        let mut objects = self.objects.lock().expect("store lock poisoned");
        match objects.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = data,
            None => objects.push((key, data)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let objects = self.objects.lock().expect("store lock poisoned");
        objects.iter().any(|(k, _)| k == key)
    }

    /// Make the next `get` of `key` fail.
    pub fn fail_next_get(&self, key: impl Into<String>) {
        self.fail_next_get
            .lock()
            .expect("store lock poisoned")
            .insert(key.into());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// How many successful `get` calls `key` has served.
    pub fn get_count(&self, key: &str) -> usize {
        self.get_counts
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list(&self) -> Result<Vec<ObjectInfo>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(DropprintError::Store("list failed (injected)".into()));
        }
        let objects = self.objects.lock().expect("store lock poisoned");
        Ok(objects
            .iter()
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        if self
            .fail_next_get
            .lock()
            .expect("store lock poisoned")
            .remove(key)
        {
            return Err(DropprintError::Store(format!("get {key} failed (injected)")));
        }

        let data = {
            let objects = self.objects.lock().expect("store lock poisoned");
            objects
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, data)| data.clone())
        };
        let data = data.ok_or_else(|| DropprintError::Store(format!("no such key: {key}")))?;

        *self
            .get_counts
            .lock()
            .expect("store lock poisoned")
            .entry(key.to_owned())
            .or_default() += 1;
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(DropprintError::Store(format!(
                "delete {key} failed (injected)"
            )));
        }
        let mut objects = self.objects.lock().expect("store lock poisoned");
        objects.retain(|(k, _)| k != key);
        debug!(key, "deleted object from memory store");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Directory-backed store
// ---------------------------------------------------------------------------

/// A local directory used as the bucket.
///
/// Keys are `/`-separated paths relative to the root, so `orders/7.ps` lives
/// at `<root>/orders/7.ps`.  Listings are sorted by key.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use `root` as the bucket, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "directory store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its file, refusing anything that could leave the root.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(DropprintError::Store(format!("invalid key: {key}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for DirectoryStore {
    async fn list(&self) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| DropprintError::Store(format!("list {}: {e}", dir.display())))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| DropprintError::Store(format!("list {}: {e}", dir.display())))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| DropprintError::Store(format!("stat {}: {e}", path.display())))?;
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                objects.push(ObjectInfo {
                    key,
                    size: meta.len(),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(count = objects.len(), "listed directory store");
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| DropprintError::Store(format!("get {key}: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| DropprintError::Store(format!("delete {key}: {e}")))?;
        debug!(key, "deleted object from directory store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_lists_in_insertion_order() {
        let store = MemoryStore::new();
        store.insert("b.ps", b"bb".to_vec());
        store.insert("a.ps", b"a".to_vec());
        let keys: Vec<_> = store
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, ["b.ps", "a.ps"]);
    }

    #[tokio::test]
    async fn memory_store_injected_get_failure_is_one_shot() {
        let store = MemoryStore::new();
        store.insert("a.ps", b"data".to_vec());
        store.fail_next_get("a.ps");
        assert!(store.get("a.ps").await.is_err());
        assert_eq!(store.get("a.ps").await.expect("second get"), b"data");
        assert_eq!(store.get_count("a.ps"), 1);
    }

    #[tokio::test]
    async fn memory_store_missing_key_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.get("gone.ps").await.is_err());
    }

    #[tokio::test]
    async fn directory_store_lists_nested_keys_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("orders/2024")).expect("mkdir");
        std::fs::write(dir.path().join("orders/2024/invoice.ps"), b"12345").expect("write");
        std::fs::write(dir.path().join("a.ps"), b"1").expect("write");

        let store = DirectoryStore::open(dir.path()).expect("open");
        let listing = store.list().await.expect("list");
        assert_eq!(
            listing,
            vec![
                ObjectInfo { key: "a.ps".into(), size: 1 },
                ObjectInfo { key: "orders/2024/invoice.ps".into(), size: 5 },
            ]
        );

        assert_eq!(store.get("orders/2024/invoice.ps").await.expect("get"), b"12345");
        store.delete("orders/2024/invoice.ps").await.expect("delete");
        assert!(!dir.path().join("orders/2024/invoice.ps").exists());
    }

    #[tokio::test]
    async fn directory_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirectoryStore::open(dir.path().join("bucket")).expect("open");
        assert!(store.get("../secret.ps").await.is_err());
        assert!(store.delete("/etc/passwd").await.is_err());
        assert!(store.get("").await.is_err());
    }
}
