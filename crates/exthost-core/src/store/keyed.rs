//! Persistent Keyed Store
//!
//! Generic per-extension key/value engine shared by the state and settings
//! stores. Mutations land in memory immediately; durable writes are debounced
//! onto a background task and always rewrite the whole document.
//!
//! ```text
//! set() ──► Idle ──schedule──► Pending(deadline) ──timer claims──► write ──► Idle
//!                                   │
//!                        flush()/reset() cancel ──► write now
//! ```

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default debounce interval between the last mutation and the durable write
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Ordered key/value entries, as persisted
pub type Entries = IndexMap<String, Value>;

#[derive(Debug, Default)]
struct Document {
    entries: Entries,
    /// Bumped on every mutation
    generation: u64,
}

#[derive(Debug)]
enum WriteState {
    Idle,
    Pending {
        token: u64,
        deadline: Instant,
        task: AbortHandle,
    },
}

/// Debounce timer for one store
#[derive(Debug)]
struct WriteScheduler {
    state: WriteState,
    next_token: u64,
}

struct StoreInner {
    path: PathBuf,
    debounce: Duration,
    /// Keys that must never be loaded from the document
    reject: Option<fn(&str) -> bool>,
    document: OnceCell<RwLock<Document>>,
    persisted_generation: AtomicU64,
    scheduler: Mutex<WriteScheduler>,
    /// Serializes durable writes
    io_lock: Mutex<()>,
    writes: AtomicU64,
}

/// Per-extension key/value store backed by one JSON document
#[derive(Clone)]
pub struct KeyedStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for KeyedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedStore")
            .field("path", &self.inner.path)
            .field("debounce", &self.inner.debounce)
            .finish()
    }
}

impl KeyedStore {
    /// Create a store for the document at `path`. Nothing is read until first access.
    pub fn new(path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self::build(path.into(), debounce, None)
    }

    /// Like [`KeyedStore::new`], but keys matching `reject` are dropped when the
    /// document loads. A document that held such keys is rewritten on the next flush.
    pub fn rejecting(path: impl Into<PathBuf>, debounce: Duration, reject: fn(&str) -> bool) -> Self {
        Self::build(path.into(), debounce, Some(reject))
    }

    fn build(path: PathBuf, debounce: Duration, reject: Option<fn(&str) -> bool>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path,
                debounce,
                reject,
                document: OnceCell::new(),
                persisted_generation: AtomicU64::new(0),
                scheduler: Mutex::new(WriteScheduler {
                    state: WriteState::Idle,
                    next_token: 0,
                }),
                io_lock: Mutex::new(()),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn document(&self) -> &RwLock<Document> {
        let path = &self.inner.path;
        let reject = self.inner.reject;
        self.inner
            .document
            .get_or_init(|| async move { RwLock::new(load_document(path, reject).await) })
            .await
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.document().await.read().await.entries.get(key).cloned()
    }

    /// Get a value deserialized into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn has(&self, key: &str) -> bool {
        self.document().await.read().await.entries.contains_key(key)
    }

    /// Set a value and schedule a durable write
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        {
            let mut doc = self.document().await.write().await;
            doc.entries.insert(key.into(), value);
            doc.generation += 1;
        }
        self.schedule_write().await;
    }

    /// Set several values at once with a single scheduled write
    pub async fn set_many(&self, entries: impl IntoIterator<Item = (String, Value)>) {
        let changed = {
            let mut doc = self.document().await.write().await;
            let before = doc.generation;
            for (key, value) in entries {
                doc.entries.insert(key, value);
                doc.generation += 1;
            }
            doc.generation != before
        };
        if changed {
            self.schedule_write().await;
        }
    }

    /// Delete a key. Returns true if it existed.
    pub async fn delete(&self, key: &str) -> bool {
        let existed = {
            let mut doc = self.document().await.write().await;
            let existed = doc.entries.shift_remove(key).is_some();
            if existed {
                doc.generation += 1;
            }
            existed
        };
        if existed {
            self.schedule_write().await;
        }
        existed
    }

    /// Keys in insertion order
    pub async fn keys(&self) -> Vec<String> {
        self.document().await.read().await.entries.keys().cloned().collect()
    }

    /// Snapshot of all entries in insertion order
    pub async fn entries(&self) -> Entries {
        self.document().await.read().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.document().await.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every key and schedule a durable write
    pub async fn clear(&self) {
        let changed = {
            let mut doc = self.document().await.write().await;
            if doc.entries.is_empty() {
                false
            } else {
                doc.entries.clear();
                doc.generation += 1;
                true
            }
        };
        if changed {
            self.schedule_write().await;
        }
    }

    /// Whether memory holds changes not yet on disk
    pub async fn is_dirty(&self) -> bool {
        match self.inner.document.get() {
            Some(document) => self.inner.is_dirty(&*document.read().await),
            None => false,
        }
    }

    /// Number of completed durable writes
    pub fn durable_writes(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Deadline of the pending debounced write, if any
    pub async fn pending_write(&self) -> Option<Instant> {
        match &self.inner.scheduler.lock().await.state {
            WriteState::Pending { deadline, .. } => Some(*deadline),
            WriteState::Idle => None,
        }
    }

    /// Cancel the pending timer and write now.
    ///
    /// Observes every mutation made before the call. A no-op when clean.
    pub async fn flush(&self) -> Result<()> {
        self.cancel_pending().await;
        self.inner.write_now().await
    }

    /// Cancel the pending debounced write without writing. Returns true if one was pending.
    pub async fn cancel_pending(&self) -> bool {
        let mut scheduler = self.inner.scheduler.lock().await;
        match std::mem::replace(&mut scheduler.state, WriteState::Idle) {
            WriteState::Pending { task, .. } => {
                task.abort();
                true
            }
            WriteState::Idle => false,
        }
    }

    async fn schedule_write(&self) {
        let mut scheduler = self.inner.scheduler.lock().await;

        // Restart the window; the old timer has not claimed its write yet
        if let WriteState::Pending { task, .. } = &scheduler.state {
            task.abort();
        }

        scheduler.next_token += 1;
        let token = scheduler.next_token;
        let delay = self.inner.debounce;
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(token).await;
        });

        scheduler.state = WriteState::Pending {
            token,
            deadline: Instant::now() + delay,
            task: task.abort_handle(),
        };
    }
}

impl StoreInner {
    fn is_dirty(&self, doc: &Document) -> bool {
        doc.generation != self.persisted_generation.load(Ordering::SeqCst)
    }

    /// Timer expiry: claim the pending slot, then write
    async fn fire(&self, token: u64) {
        {
            let mut scheduler = self.scheduler.lock().await;
            let claimed = matches!(
                &scheduler.state,
                WriteState::Pending { token: current, .. } if *current == token
            );
            if !claimed {
                return;
            }
            scheduler.state = WriteState::Idle;
        }

        if let Err(e) = self.write_now().await {
            warn!("Background write failed, will retry on next flush: {}", e);
        }
    }

    async fn write_now(&self) -> Result<()> {
        let Some(document) = self.document.get() else {
            return Ok(());
        };

        let _io = self.io_lock.lock().await;

        let (bytes, generation) = {
            let doc = document.read().await;
            if !self.is_dirty(&doc) {
                return Ok(());
            }
            (serde_json::to_vec_pretty(&doc.entries)?, doc.generation)
        };

        write_atomic(&self.path, &bytes)
            .await
            .map_err(|source| Error::Persistence {
                path: self.path.clone(),
                source,
            })?;

        self.persisted_generation.store(generation, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!("Persisted {} (generation {})", self.path.display(), generation);

        Ok(())
    }
}

async fn load_document(path: &Path, reject: Option<fn(&str) -> bool>) -> Document {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Document::default(),
        Err(e) => {
            warn!("Failed to read {}, starting empty: {}", path.display(), e);
            return Document::default();
        }
    };

    match serde_json::from_str::<Entries>(&content) {
        Ok(mut entries) => {
            let before = entries.len();
            if let Some(reject) = reject {
                entries.retain(|key, _| {
                    if reject(key) {
                        warn!("Dropping disallowed key '{}' from {}", key, path.display());
                        false
                    } else {
                        true
                    }
                });
            }
            // Dirty from the start when something was dropped, so the next flush rewrites the file
            let generation = u64::from(entries.len() != before);
            Document { entries, generation }
        }
        Err(e) => {
            warn!("Ignoring unparsable store {}: {}", path.display(), e);
            Document::default()
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let result = async {
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;
    if result.is_err() {
        // Best-effort; the original error is what matters
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHORT: Duration = Duration::from_millis(50);

    fn store_in(dir: &tempfile::TempDir, name: &str, debounce: Duration) -> KeyedStore {
        KeyedStore::new(dir.path().join(format!("{name}.json")), debounce)
    }

    #[tokio::test]
    async fn test_set_flush_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "weather", Duration::from_secs(60));

        store.set("city", json!("Lisbon")).await;
        store.set("units", json!({"temp": "C"})).await;
        assert!(store.is_dirty().await);
        store.flush().await.unwrap();
        assert!(!store.is_dirty().await);

        let reloaded = store_in(&dir, "weather", Duration::from_secs(60));
        assert_eq!(reloaded.get("city").await, Some(json!("Lisbon")));
        assert_eq!(reloaded.get("units").await, Some(json!({"temp": "C"})));
        assert_eq!(reloaded.keys().await, vec!["city", "units"]);
    }

    #[tokio::test]
    async fn test_debounced_sets_coalesce_into_one_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "counter", SHORT);

        for i in 0..10 {
            store.set("count", json!(i)).await;
            store.set(format!("k{i}"), json!(true)).await;
        }
        assert_eq!(store.durable_writes(), 0);
        assert!(store.pending_write().await.is_some());

        tokio::time::sleep(SHORT * 6).await;

        assert_eq!(store.durable_writes(), 1);
        assert!(store.pending_write().await.is_none());

        let on_disk: Entries =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["count"], json!(9));
        assert_eq!(on_disk.len(), 11);
    }

    #[tokio::test]
    async fn test_flush_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "idem", Duration::from_secs(60));

        store.flush().await.unwrap();
        assert_eq!(store.durable_writes(), 0);
        assert!(!store.path().exists());

        store.set("a", json!(1)).await;
        store.flush().await.unwrap();
        store.flush().await.unwrap();
        assert_eq!(store.durable_writes(), 1);
    }

    #[tokio::test]
    async fn test_flush_cancels_pending_timer() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "cancel", SHORT);

        store.set("a", json!(1)).await;
        store.flush().await.unwrap();
        assert!(store.pending_write().await.is_none());

        tokio::time::sleep(SHORT * 4).await;
        assert_eq!(store.durable_writes(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "order", Duration::from_secs(60));

        store.set("b", json!(1)).await;
        store.set("a", json!(2)).await;
        store.set("c", json!(3)).await;

        assert!(store.delete("a").await);
        assert!(!store.delete("a").await);
        assert!(!store.has("a").await);
        assert_eq!(store.keys().await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_documents_load_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = store_in(&dir, "missing", SHORT);
        assert!(missing.is_empty().await);

        std::fs::write(dir.path().join("corrupt.json"), "{not json").unwrap();
        let corrupt = store_in(&dir, "corrupt", SHORT);
        assert!(corrupt.is_empty().await);
        assert_eq!(corrupt.get("anything").await, None);
    }

    #[tokio::test]
    async fn test_flush_surfaces_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let store = KeyedStore::new(blocker.join("state").join("x.json"), Duration::from_secs(60));
        store.set("a", json!(1)).await;

        let err = store.flush().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(store.is_dirty().await);
        assert_eq!(store.get("a").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupant"), "keeps the directory non-empty").unwrap();

        let store = KeyedStore::new(&target, Duration::from_secs(60));
        store.set("a", json!(1)).await;

        let err = store.flush().await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(!dir.path().join("x.json.tmp").exists());
        assert!(store.is_dirty().await);
    }

    #[tokio::test]
    async fn test_rejected_keys_dropped_on_load_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered.json");
        std::fs::write(&path, r#"{"secret_a": 1, "keep": 2, "secret_b": 3}"#).unwrap();

        let store = KeyedStore::rejecting(&path, Duration::from_secs(60), |key| key.starts_with("secret_"));
        assert_eq!(store.keys().await, vec!["keep"]);
        assert!(store.is_dirty().await);

        store.flush().await.unwrap();
        let on_disk: Entries = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk["keep"], json!(2));
    }

    #[tokio::test]
    async fn test_get_as() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "typed", SHORT);

        store.set("limit", json!(25)).await;
        let limit: Option<u32> = store.get_as("limit").await.unwrap();
        assert_eq!(limit, Some(25));
        assert!(store.get_as::<u32>("missing").await.unwrap().is_none());
        assert!(store.get_as::<bool>("limit").await.is_err());
    }
}
