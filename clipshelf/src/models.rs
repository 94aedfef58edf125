//! Core data models for Clipshelf
//!
//! `StoredEntry` is the internal, persisted form. It converts to the
//! FFI-facing `ClipboardEntry` record for Swift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::interface::{Category, ClipboardEntry};

/// Version written into every history blob
pub const BLOB_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported blob version {found} (max {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

// ─────────────────────────────────────────────────────────────────────────────
// INTERNAL ENTRY (not exposed via FFI, used for storage)
// ─────────────────────────────────────────────────────────────────────────────

/// Internal clipboard entry representation for the shared blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_favorite: bool,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    /// Create a new entry; the category is detected here and never again
    pub fn new(text: String) -> Self {
        let category = crate::content_detection::classify(&text);
        Self {
            id: Uuid::new_v4(),
            text,
            created_at: Utc::now(),
            is_pinned: false,
            is_favorite: false,
            category,
            tags: Vec::new(),
            note: None,
            usage_count: 0,
            last_used_at: None,
        }
    }

    /// Append a tag unless it is empty or already present.
    /// Returns whether the tag list changed.
    pub fn add_tag(&mut self, tag: String) -> bool {
        if tag.is_empty() || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// An empty note clears the field
    pub fn set_note(&mut self, note: String) {
        self.note = if note.is_empty() { None } else { Some(note) };
    }

    pub fn record_usage(&mut self, now: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = Some(now);
    }

    /// Convert to the FFI record
    pub fn to_clipboard_entry(&self) -> ClipboardEntry {
        ClipboardEntry {
            id: self.id.to_string(),
            text: self.text.clone(),
            created_at_unix: self.created_at.timestamp(),
            is_pinned: self.is_pinned,
            is_favorite: self.is_favorite,
            category: self.category,
            tags: self.tags.clone(),
            note: self.note.clone(),
            usage_count: self.usage_count,
            last_used_at_unix: self.last_used_at.map(|t| t.timestamp()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// COLLECTION CODEC
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HistoryBlobRef<'a> {
    version: u32,
    entries: &'a [StoredEntry],
}

#[derive(Deserialize)]
struct HistoryBlob {
    version: u32,
    entries: Vec<StoredEntry>,
}

/// Blob layouts accepted on read. The bare array predates the version field.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnyBlob {
    Versioned(HistoryBlob),
    Legacy(Vec<StoredEntry>),
}

/// Encode the whole collection as one blob
pub fn encode_collection(entries: &[StoredEntry]) -> Result<Vec<u8>, CodecError> {
    let blob = HistoryBlobRef {
        version: BLOB_VERSION,
        entries,
    };
    Ok(serde_json::to_vec(&blob)?)
}

/// Decode a blob written by any process sharing the store
pub fn decode_collection(bytes: &[u8]) -> Result<Vec<StoredEntry>, CodecError> {
    match serde_json::from_slice::<AnyBlob>(bytes)? {
        AnyBlob::Versioned(blob) if blob.version > BLOB_VERSION => Err(CodecError::UnsupportedVersion {
            found: blob.version,
            supported: BLOB_VERSION,
        }),
        AnyBlob::Versioned(blob) => Ok(blob.entries),
        AnyBlob::Legacy(entries) => Ok(entries),
    }
}

/// Parse an FFI id string; malformed ids match nothing
pub fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_collection() -> Vec<StoredEntry> {
        let mut pinned = StoredEntry::new("https://example.com".to_string());
        pinned.is_pinned = true;
        pinned.add_tag("work".to_string());
        pinned.set_note("from the standup".to_string());
        pinned.record_usage(Utc::now());

        let mut favorite = StoredEntry::new("let x = 1; let y = 2;".to_string());
        favorite.is_favorite = true;

        vec![StoredEntry::new("hello".to_string()), pinned, favorite]
    }

    #[test]
    fn test_new_entry_defaults() {
        let entry = StoredEntry::new("user@example.com".to_string());
        assert_eq!(entry.category, Category::Email);
        assert!(!entry.is_pinned);
        assert!(!entry.is_favorite);
        assert!(entry.tags.is_empty());
        assert_eq!(entry.note, None);
        assert_eq!(entry.usage_count, 0);
        assert_eq!(entry.last_used_at, None);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = StoredEntry::new("same".to_string());
        let b = StoredEntry::new("same".to_string());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_tags_are_an_ordered_set() {
        let mut entry = StoredEntry::new("x".to_string());
        assert!(entry.add_tag("b".to_string()));
        assert!(entry.add_tag("a".to_string()));
        assert!(!entry.add_tag("b".to_string()));
        assert!(!entry.add_tag(String::new()));
        assert_eq!(entry.tags, vec!["b", "a"]);
    }

    #[test]
    fn test_set_note_empty_clears() {
        let mut entry = StoredEntry::new("x".to_string());
        entry.set_note("remember".to_string());
        assert_eq!(entry.note.as_deref(), Some("remember"));
        entry.set_note(String::new());
        assert_eq!(entry.note, None);
    }

    #[test]
    fn test_record_usage() {
        let mut entry = StoredEntry::new("x".to_string());
        let now = Utc::now();
        entry.record_usage(now);
        entry.record_usage(now);
        assert_eq!(entry.usage_count, 2);
        assert_eq!(entry.last_used_at, Some(now));
    }

    #[test]
    fn test_collection_roundtrip_preserves_order_and_fields() {
        let collection = sample_collection();
        let bytes = encode_collection(&collection).unwrap();
        let decoded = decode_collection(&bytes).unwrap();
        assert_eq!(decoded, collection);
    }

    #[test]
    fn test_empty_collection_roundtrip() {
        let bytes = encode_collection(&[]).unwrap();
        assert!(decode_collection(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_category_serialized_lowercase() {
        let entry = StoredEntry::new("hi".to_string());
        let json = String::from_utf8(encode_collection(&[entry]).unwrap()).unwrap();
        assert!(json.contains(r#""category":"short""#), "{json}");
        assert!(json.contains(r#""version":1"#), "{json}");
    }

    #[test]
    fn test_decode_legacy_array_with_missing_optional_fields() {
        let json = r#"[{
            "id": "6f1c5a52-6d5e-4b7a-9d43-3f0a1c2b9e11",
            "text": "hello",
            "created_at": "2024-05-01T10:00:00Z",
            "category": "short"
        }]"#;
        let entries = decode_collection(json.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "hello");
        assert_eq!(entries[0].usage_count, 0);
        assert!(entries[0].tags.is_empty());
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let json = r#"{"version": 99, "entries": []}"#;
        assert!(matches!(
            decode_collection(json.as_bytes()),
            Err(CodecError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_collection(b"not json").is_err());
        assert!(decode_collection(&[0xff, 0x00, 0x12]).is_err());
    }

    #[test]
    fn test_to_clipboard_entry() {
        let mut entry = StoredEntry::new("hello".to_string());
        entry.record_usage(Utc::now());
        let ffi = entry.to_clipboard_entry();
        assert_eq!(ffi.id, entry.id.to_string());
        assert_eq!(ffi.text, "hello");
        assert_eq!(ffi.category, Category::Short);
        assert_eq!(ffi.usage_count, 1);
        assert_eq!(ffi.created_at_unix, entry.created_at.timestamp());
        assert!(ffi.last_used_at_unix.is_some());
    }

    #[test]
    fn test_parse_id() {
        let entry = StoredEntry::new("x".to_string());
        assert_eq!(parse_id(&entry.id.to_string()), Some(entry.id));
        assert_eq!(parse_id("not-a-uuid"), None);
    }
}
