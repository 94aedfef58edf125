//! Process-wide tracing setup
//!
//! Both the host app and the keyboard extension call `init_logging` once at
//! launch. Output goes to stderr, which the OS forwards to the unified log.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Used when neither `RUST_LOG` nor the caller supplies a usable filter
const DEFAULT_FILTER: &str = "clipshelf=info";

static LOGGING_INIT: Once = Once::new();

fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the fmt subscriber. `filter` uses `RUST_LOG` syntax
/// (e.g. `"clipshelf=debug"`); an empty or invalid filter falls back to info.
/// Only the first call has any effect.
#[uniffi::export]
pub fn init_logging(filter: String) {
    LOGGING_INIT.call_once(|| {
        let directives = if filter.trim().is_empty() {
            DEFAULT_FILTER
        } else {
            filter.as_str()
        };
        // Another subscriber may already be installed by the embedding process
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(true)
            .with_env_filter(build_filter(directives))
            .with_writer(std::io::stderr)
            .try_init();
        tracing::debug!(filter = directives, "Logging initialized");
    });
}
