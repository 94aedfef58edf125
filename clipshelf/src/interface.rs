//! Clipshelf FFI Interface Definition
//!
//! This file defines the public interface exposed to Swift via UniFFI.
//! Both the host app and the keyboard extension link the same library, so
//! these types are the single source of truth for the shared history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Content category assigned once, when an entry is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Link,
    Email,
    Code,
    Phone,
    Short,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Text,
        Category::Link,
        Category::Email,
        Category::Code,
        Category::Phone,
        Category::Short,
    ];

    /// Stable string form, shared with the persisted blob
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Link => "link",
            Category::Email => "email",
            Category::Code => "code",
            Category::Phone => "phone",
            Category::Short => "short",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClipshelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ClipshelfError::InvalidInput(format!("unknown category: {}", s)))
    }
}

/// What happened to the history, delivered to every subscribed observer
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum HistoryChange {
    /// A new entry was placed at the head
    Inserted { id: String },
    /// Fields of an existing entry changed (text, pin, favorite, tags, note, usage)
    Updated { id: String },
    /// Targeted removal; observers can evict the id without a full reload
    Deleted { id: String },
    /// The whole history was emptied
    Cleared,
    /// Local changes held back by a failed write have now reached the shared store
    Flushed,
    /// The in-memory copy was replaced from the shared store
    Reloaded,
}

impl HistoryChange {
    /// True for changes made by this process (everything except a reload)
    pub fn is_local(&self) -> bool {
        !matches!(self, HistoryChange::Reloaded)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// One captured text item with its metadata
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ClipboardEntry {
    pub id: String,
    pub text: String,
    pub created_at_unix: i64,
    pub is_pinned: bool,
    pub is_favorite: bool,
    pub category: Category,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub usage_count: u64,
    pub last_used_at_unix: Option<i64>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for Clipshelf operations
#[derive(Debug, Error, uniffi::Error)]
pub enum ClipshelfError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failure reported by a [`PersistenceAdapter`]
#[derive(Debug, Error, uniffi::Error)]
pub enum StorageError {
    #[error("Read failed: {reason}")]
    ReadFailed { reason: String },
    #[error("Write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("Unexpected callback error: {reason}")]
    Callback { reason: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for StorageError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        StorageError::Callback { reason: e.reason }
    }
}

impl From<StorageError> for ClipshelfError {
    fn from(e: StorageError) -> Self {
        ClipshelfError::StorageError(e.to_string())
    }
}

impl From<crate::database::DatabaseError> for ClipshelfError {
    fn from(e: crate::database::DatabaseError) -> Self {
        ClipshelfError::DatabaseError(e.to_string())
    }
}

impl From<crate::config::ConfigError> for ClipshelfError {
    fn from(e: crate::config::ConfigError) -> Self {
        ClipshelfError::ConfigError(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATOR INTERFACES (implemented in Swift or by the adapters in this crate)
// ═══════════════════════════════════════════════════════════════════════════════

/// Key-value store shared by every cooperating process (app-group scoped)
#[uniffi::export(with_foreign)]
pub trait PersistenceAdapter: Send + Sync {
    /// Read the bytes under `key`; `Ok(None)` when the key was never written
    fn get(&self, key: String) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the bytes under `key`
    fn set(&self, key: String, value: Vec<u8>) -> Result<(), StorageError>;

    /// Delete `key`; removing a missing key succeeds
    fn remove(&self, key: String) -> Result<(), StorageError>;
}

/// Read-only view of the system-wide pasteboard
#[uniffi::export(with_foreign)]
pub trait SystemPasteboard: Send + Sync {
    /// Monotonic counter bumped by the OS on every pasteboard write
    fn change_count(&self) -> i64;

    fn string(&self) -> Option<String>;

    fn has_strings(&self) -> bool;
}

/// OS-wide, payload-less notification primitive (Darwin notify center)
///
/// Implementations must call [`crate::deliver_signal`] with the registered
/// token whenever `name` is posted by any process.
#[uniffi::export(with_foreign)]
pub trait SignalTransport: Send + Sync {
    fn post(&self, name: String);

    fn add_observer(&self, name: String, token: u64);

    fn remove_observer(&self, token: u64);
}

/// Change callback for UI collaborators
#[uniffi::export(with_foreign)]
pub trait HistoryObserver: Send + Sync {
    fn on_history_changed(&self, change: HistoryChange);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The primary interface for reading and mutating the shared history.
/// This matches the functionality exposed by the `EntryStore` object.
///
/// None of the operations fail: storage problems are logged and the
/// in-memory copy stays authoritative, unknown ids are ignored.
#[uniffi::export(with_foreign)]
pub trait HistoryStoreApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Re-read the shared store into memory and return the collection
    fn load(&self) -> Vec<ClipboardEntry>;

    /// Snapshot of the in-memory collection, most recent first
    fn entries(&self) -> Vec<ClipboardEntry>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert text at the head, moving an existing duplicate to the front
    fn add(&self, text: String);

    /// Replace the text of an entry; its category is left untouched
    fn update(&self, id: String, new_text: String);

    fn toggle_pin(&self, id: String);

    fn toggle_favorite(&self, id: String);

    fn add_tag(&self, tag: String, id: String);

    /// Set or (with an empty string) clear the note
    fn set_note(&self, note: String, id: String);

    /// Count a re-emission of `text` to the pasteboard
    fn register_usage(&self, text: String);

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn delete(&self, id: String);

    /// Empty the history and remove the persisted blob
    fn clear_all(&self);
}
