//! Pasteboard monitor
//!
//! Polls the system pasteboard and funnels newly copied text into the store.
//! Two guards keep ingestion to at most once per copy:
//! - the OS change counter, checked before reading any content
//! - the last text this process ingested or wrote back itself

use crate::interface::{HistoryStoreApi, SystemPasteboard};
use crate::store::EntryStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct MonitorState {
    last_seen_change_count: i64,
    last_seen_text: Option<String>,
}

#[derive(uniffi::Object)]
pub struct ClipboardMonitor {
    pasteboard: Arc<dyn SystemPasteboard>,
    store: Arc<EntryStore>,
    max_text_length: usize,
    state: Mutex<MonitorState>,
}

/// Cut `text` to at most `max_chars` characters
fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

#[uniffi::export]
impl ClipboardMonitor {
    /// Start from the pasteboard's current counter so whatever is already on
    /// the pasteboard is not treated as a new copy
    #[uniffi::constructor]
    pub fn new(pasteboard: Arc<dyn SystemPasteboard>, store: Arc<EntryStore>) -> Arc<Self> {
        let last_seen_change_count = pasteboard.change_count();
        let max_text_length = store.config().max_text_length as usize;
        Arc::new(Self {
            pasteboard,
            store,
            max_text_length,
            state: Mutex::new(MonitorState {
                last_seen_change_count,
                last_seen_text: None,
            }),
        })
    }

    /// Check the pasteboard once. Returns true when new text was ingested.
    pub fn tick(&self) -> bool {
        let change_count = self.pasteboard.change_count();
        {
            let mut state = self.state.lock();
            if change_count == state.last_seen_change_count {
                return false;
            }
            state.last_seen_change_count = change_count;
        }

        let Some(text) = self.pasteboard.string() else {
            return false;
        };
        if text.is_empty() || !self.pasteboard.has_strings() {
            return false;
        }
        let text = truncate_chars(text, self.max_text_length);

        {
            let mut state = self.state.lock();
            if state.last_seen_text.as_deref() == Some(text.as_str()) {
                debug!(change_count, "Skipping text this process already saw");
                return false;
            }
            state.last_seen_text = Some(text.clone());
        }

        debug!(change_count, chars = text.chars().count(), "Ingesting pasteboard text");
        self.store.add(text);
        true
    }

    /// The host wrote `text` back to the pasteboard (a "copy" from history).
    /// Counts the usage and keeps the next tick from re-ingesting it.
    pub fn note_local_copy(&self, text: String) {
        self.state.lock().last_seen_text = Some(text.clone());
        self.store.register_usage(text);
    }

    pub fn last_seen_change_count(&self) -> i64 {
        self.state.lock().last_seen_change_count
    }
}
