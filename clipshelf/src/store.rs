//! EntryStore - the authoritative in-process view of the shared history
//!
//! Each process owns exactly one `EntryStore` and hands out `Arc` handles.
//! The collection lives in memory and is written back to the shared
//! `PersistenceAdapter` as one blob after every mutation.
//!
//! Failure model: storage errors are logged, never returned. The in-memory
//! copy stays authoritative until the next successful write, and
//! reconciliation refuses to overwrite it with stale shared state meanwhile.

use crate::config::HistoryConfig;
use crate::interface::{
    ClipboardEntry, HistoryChange, HistoryObserver, HistoryStoreApi, PersistenceAdapter,
};
use crate::models::{self, StoredEntry};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, debug_span, info, warn};
use uuid::Uuid;

/// Thread-safe history store backed by a shared key-value store
///
/// Concurrency Model:
/// - The collection sits behind an RwLock; writers persist while holding it so
///   blob writes land in mutation order
/// - Observers run after the lock is released, so they may call back in
/// - Overlapping reloads are harmless: each is a full replace
#[derive(uniffi::Object)]
pub struct EntryStore {
    adapter: Arc<dyn PersistenceAdapter>,
    config: HistoryConfig,
    entries: RwLock<Vec<StoredEntry>>,
    /// Set while the latest write to the shared store failed
    unsaved: AtomicBool,
    observers: Mutex<Vec<(u64, Arc<dyn HistoryObserver>)>>,
    next_observer_id: AtomicU64,
}

// Internal implementation (not exported via FFI)
impl EntryStore {
    /// Create a store and populate it from the shared store.
    /// Out-of-range config fields fall back to their defaults.
    pub fn open(adapter: Arc<dyn PersistenceAdapter>, config: HistoryConfig) -> Arc<Self> {
        let store = Arc::new(Self {
            adapter,
            config: config.sanitized(),
            entries: RwLock::new(Vec::new()),
            unsaved: AtomicBool::new(false),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(1),
        });
        store.reload();
        store
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn max_entries(&self) -> usize {
        self.config.max_entries as usize
    }

    /// Read and decode the shared blob.
    /// A missing key or an undecodable blob reads as an empty collection;
    /// only a failing adapter is reported.
    fn read_shared(&self) -> Result<Vec<StoredEntry>, crate::interface::StorageError> {
        let Some(bytes) = self.adapter.get(self.config.storage_key.clone())? else {
            return Ok(Vec::new());
        };
        match models::decode_collection(&bytes) {
            Ok(entries) => Ok(self.normalize(entries)),
            Err(e) => {
                warn!(error = %e, bytes = bytes.len(), "Discarding undecodable history blob");
                Ok(Vec::new())
            }
        }
    }

    /// Enforce the collection invariants on data written by another process:
    /// unique text (first occurrence wins) and the capacity bound.
    fn normalize(&self, entries: Vec<StoredEntry>) -> Vec<StoredEntry> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut normalized: Vec<StoredEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.text.clone()))
            .collect();
        normalized.truncate(self.max_entries());
        normalized
    }

    /// Write the whole collection. Returns whether it reached the shared store.
    fn persist(&self, entries: &[StoredEntry]) -> bool {
        let result = models::encode_collection(entries)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                self.adapter
                    .set(self.config.storage_key.clone(), bytes)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => {
                self.unsaved.store(false, Ordering::SeqCst);
                true
            }
            Err(reason) => {
                warn!(error = %reason, count = entries.len(), "Failed to persist clipboard history");
                self.unsaved.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    /// Apply a mutation, persist, then notify. `f` returns `None` when nothing
    /// changed (unknown id, no-op toggle), in which case nothing is written.
    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<StoredEntry>) -> Option<HistoryChange>,
    {
        let change = {
            let mut entries = self.entries.write();
            let Some(change) = f(&mut entries) else {
                return;
            };
            self.persist(&entries);
            change
        };
        self.notify(change);
    }

    /// Apply `f` to the entry with `id`, if any
    fn mutate_entry<F>(&self, id: &str, f: F)
    where
        F: FnOnce(&mut StoredEntry) -> bool,
    {
        let Some(uuid) = models::parse_id(id) else {
            debug!(entry_id = id, "Ignoring malformed entry id");
            return;
        };
        self.mutate(|entries| {
            let entry = entries.iter_mut().find(|e| e.id == uuid)?;
            if f(entry) {
                Some(HistoryChange::Updated { id: uuid.to_string() })
            } else {
                None
            }
        });
    }

    fn notify(&self, change: HistoryChange) {
        let observers: Vec<Arc<dyn HistoryObserver>> =
            self.observers.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in observers {
            observer.on_history_changed(change.clone());
        }
    }

    /// Reconcile the in-memory copy with the shared store.
    /// Returns true when the visible collection changed.
    ///
    /// The write lock is held from the shared read to the replace, so a local
    /// mutation on another thread either lands before the read or waits for it.
    pub fn reload(&self) -> bool {
        let span = debug_span!("store.reload");
        let _enter = span.enter();

        let (flushed, changed) = {
            let mut entries = self.entries.write();

            let mut flushed = false;
            if self.unsaved.load(Ordering::SeqCst) {
                if !self.persist(&entries) {
                    debug!("Keeping unsaved local history; shared store still unwritable");
                    return false;
                }
                info!(count = entries.len(), "Flushed pending local history");
                flushed = true;
            }

            match self.read_shared() {
                Ok(shared) if *entries != shared => {
                    *entries = shared;
                    (flushed, true)
                }
                Ok(_) => (flushed, false),
                Err(e) => {
                    warn!(error = %e, "Failed to read shared history; keeping local copy");
                    (flushed, false)
                }
            }
        };

        if flushed {
            self.notify(HistoryChange::Flushed);
        }
        if changed {
            debug!(count = self.len(), "Reloaded history from shared store");
            self.notify(HistoryChange::Reloaded);
        }
        changed
    }

    /// True while the latest local write has not reached the shared store
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Look up a single entry
    pub fn entry(&self, id: &str) -> Option<ClipboardEntry> {
        let uuid: Uuid = models::parse_id(id)?;
        self.entries
            .read()
            .iter()
            .find(|e| e.id == uuid)
            .map(StoredEntry::to_clipboard_entry)
    }
}

// FFI-exported constructor and subscription management
#[uniffi::export]
impl EntryStore {
    /// Create a store over a shared adapter and load the current history
    #[uniffi::constructor]
    pub fn new(adapter: Arc<dyn PersistenceAdapter>, config: HistoryConfig) -> Arc<Self> {
        Self::open(adapter, config)
    }

    /// Register a change callback. Returns an id for `unsubscribe`.
    pub fn subscribe(&self, observer: Arc<dyn HistoryObserver>) -> u64 {
        let id = self.next_observer_id.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().push((id, observer));
        id
    }

    pub fn unsubscribe(&self, subscription: u64) {
        self.observers.lock().retain(|(id, _)| *id != subscription);
    }

    /// Reconcile with the shared store; true when the collection changed
    pub fn reconcile(&self) -> bool {
        self.reload()
    }
}

#[uniffi::export]
impl HistoryStoreApi for EntryStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn load(&self) -> Vec<ClipboardEntry> {
        self.reload();
        self.entries()
    }

    fn entries(&self) -> Vec<ClipboardEntry> {
        self.entries
            .read()
            .iter()
            .map(StoredEntry::to_clipboard_entry)
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Save text at the head of the history.
    /// A duplicate is replaced by a brand-new entry: its pin, tags and usage are dropped.
    /// Capacity eviction removes the tail entry even when it is pinned.
    fn add(&self, text: String) {
        if text.is_empty() {
            return;
        }
        let max = self.max_entries();
        self.mutate(|entries| {
            entries.retain(|e| e.text != text);
            let entry = StoredEntry::new(text);
            let id = entry.id.to_string();
            entries.insert(0, entry);
            if entries.len() > max {
                let evicted = entries.len() - max;
                entries.truncate(max);
                debug!(evicted, "Evicted oldest history entries");
            }
            Some(HistoryChange::Inserted { id })
        });
    }

    /// Replace an entry's text without reclassifying it.
    /// Another entry already holding `new_text` is removed to keep texts unique.
    fn update(&self, id: String, new_text: String) {
        if new_text.is_empty() {
            return;
        }
        let Some(uuid) = models::parse_id(&id) else {
            return;
        };
        self.mutate(|entries| {
            if !entries.iter().any(|e| e.id == uuid) {
                return None;
            }
            entries.retain(|e| e.id == uuid || e.text != new_text);
            let entry = entries.iter_mut().find(|e| e.id == uuid)?;
            if entry.text == new_text {
                return None;
            }
            entry.text = new_text;
            Some(HistoryChange::Updated { id })
        });
    }

    fn toggle_pin(&self, id: String) {
        self.mutate_entry(&id, |entry| {
            entry.is_pinned = !entry.is_pinned;
            true
        });
    }

    fn toggle_favorite(&self, id: String) {
        self.mutate_entry(&id, |entry| {
            entry.is_favorite = !entry.is_favorite;
            true
        });
    }

    fn add_tag(&self, tag: String, id: String) {
        self.mutate_entry(&id, |entry| entry.add_tag(tag));
    }

    fn set_note(&self, note: String, id: String) {
        self.mutate_entry(&id, |entry| {
            entry.set_note(note);
            true
        });
    }

    fn register_usage(&self, text: String) {
        let now = Utc::now();
        self.mutate(|entries| {
            let entry = entries.iter_mut().find(|e| e.text == text)?;
            entry.record_usage(now);
            Some(HistoryChange::Updated { id: entry.id.to_string() })
        });
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn delete(&self, id: String) {
        let Some(uuid) = models::parse_id(&id) else {
            return;
        };
        self.mutate(|entries| {
            let index = entries.iter().position(|e| e.id == uuid)?;
            entries.remove(index);
            Some(HistoryChange::Deleted { id })
        });
    }

    fn clear_all(&self) {
        {
            let mut entries = self.entries.write();
            entries.clear();
            match self.adapter.remove(self.config.storage_key.clone()) {
                Ok(()) => self.unsaved.store(false, Ordering::SeqCst),
                Err(e) => {
                    warn!(error = %e, "Failed to remove persisted history");
                    self.unsaved.store(true, Ordering::SeqCst);
                }
            }
        }
        self.notify(HistoryChange::Cleared);
    }
}
