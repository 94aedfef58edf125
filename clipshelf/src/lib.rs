//! Clipshelf Core - shared clipboard history for a host app and its keyboard extension
//!
//! Both processes link this library. Each owns one `EntryStore` over the same
//! shared key-value storage; a payload-less system-wide signal tells the other
//! side to re-read it, with a polling timer as the fallback.
//!
//! Types are exported via UniFFI proc-macros (#[derive(uniffi::Record/Enum)]).

pub mod config;
pub mod content_detection;
#[cfg(target_vendor = "apple")]
pub mod darwin;
pub mod database;
pub mod interface;
pub mod logging;
pub mod memory;
pub mod models;
pub mod monitor;
pub mod signal;
mod store;
mod sync;

pub use config::HistoryConfig;
pub use database::SqliteStore;
pub use interface::*;
pub use memory::MemoryStore;
pub use monitor::ClipboardMonitor;
pub use signal::{deliver_signal, LoopbackTransport, ObserverToken, SignalBus};
pub use store::EntryStore;
pub use sync::SyncCoordinator;

/// Category the text would get if it were saved now
#[uniffi::export]
pub fn classify_text(text: String) -> Category {
    content_detection::classify(&text)
}

uniffi::setup_scaffolding!("clipshelf");
