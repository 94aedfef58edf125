//! In-memory `PersistenceAdapter`
//!
//! Stands in for the shared container in tests and SwiftUI previews. Sharing
//! one `Arc<MemoryStore>` between two `EntryStore`s models two processes
//! looking at the same app-group storage.

use crate::interface::{PersistenceAdapter, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }
}

impl PersistenceAdapter for MemoryStore {
    fn get(&self, key: String) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values.lock().get(&key).cloned())
    }

    fn set(&self, key: String, value: Vec<u8>) -> Result<(), StorageError> {
        self.values.lock().insert(key, value);
        Ok(())
    }

    fn remove(&self, key: String) -> Result<(), StorageError> {
        self.values.lock().remove(&key);
        Ok(())
    }
}

/// Volatile store for previews; nothing survives the process
#[uniffi::export]
pub fn new_memory_store() -> Arc<dyn PersistenceAdapter> {
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k".to_string()).unwrap(), None);

        store.set("k".to_string(), vec![1, 2, 3]).unwrap();
        assert_eq!(store.get("k".to_string()).unwrap(), Some(vec![1, 2, 3]));
        assert!(store.contains_key("k"));

        store.remove("k".to_string()).unwrap();
        assert!(!store.contains_key("k"));
        // Removing again is fine
        store.remove("k".to_string()).unwrap();
    }
}
