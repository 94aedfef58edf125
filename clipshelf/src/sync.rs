//! SyncCoordinator - keeps one process's EntryStore converged with the others
//!
//! Wiring:
//! - local mutation that reached the shared store → post the signal
//! - any received signal (our own included) → reload
//! - polling timer → monitor tick, then reload
//!
//! Reloading after our own signal is a no-op because the shared blob already
//! equals the in-memory copy, so self and foreign signals need no distinction.
//!
//! Timer Architecture:
//! The timer is a tokio task on the caller's runtime, or on a global fallback
//! runtime when called from Swift (UniFFI provides none). It is cancelled
//! through a DropGuard held by the running state, so `stop()` and dropping the
//! coordinator both end it.

use crate::interface::{HistoryChange, HistoryObserver};
use crate::monitor::ClipboardMonitor;
use crate::signal::{ObserverToken, SignalBus};
use crate::store::EntryStore;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Global fallback Tokio runtime for when the coordinator is started outside any runtime context.
/// Shared across all coordinators and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("clipshelf-sync")
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// RAII guard that cancels a token when dropped.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Posts the signal for every local change that reached the shared store
struct SignalForwarder {
    bus: Arc<SignalBus>,
    store: Weak<EntryStore>,
}

impl HistoryObserver for SignalForwarder {
    fn on_history_changed(&self, change: HistoryChange) {
        if !change.is_local() {
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };
        // Not in the shared store yet; the reload that flushes it emits `Flushed`
        if store.has_unsaved_changes() {
            debug!(?change, "Local change not persisted; not signalling");
            return;
        }
        self.bus.post();
    }
}

/// One polling round: pick up a new copy, then converge with the shared store
fn poll_once(monitor: Option<&ClipboardMonitor>, store: &EntryStore) {
    if let Some(monitor) = monitor {
        monitor.tick();
    }
    store.reload();
}

/// Handles owned while the coordinator is running
struct Running {
    observer: ObserverToken,
    subscription: u64,
    _timer: DropGuard,
}

#[derive(uniffi::Object)]
pub struct SyncCoordinator {
    store: Arc<EntryStore>,
    bus: Arc<SignalBus>,
    /// Only the process watching the pasteboard (the host app) has one
    monitor: Option<Arc<ClipboardMonitor>>,
    polling_interval: Duration,
    running: Mutex<Option<Running>>,
}

impl SyncCoordinator {
    fn spawn_timer(&self) -> DropGuard {
        let token = CancellationToken::new();
        let guard = DropGuard::new(token.clone());
        let store = Arc::clone(&self.store);
        let monitor = self.monitor.clone();
        let period = self.polling_interval;

        runtime_handle().spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; start() already reconciled
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let store = Arc::clone(&store);
                        let monitor = monitor.clone();
                        // Pasteboard and storage calls block on foreign code
                        let round = tokio::task::spawn_blocking(move || {
                            poll_once(monitor.as_deref(), &store);
                        });
                        if let Err(e) = round.await {
                            warn!(error = %e, "Polling round failed");
                        }
                    }
                }
            }
            trace!("Polling timer stopped");
        });

        guard
    }
}

#[uniffi::export]
impl SyncCoordinator {
    /// Polling interval comes from the store's `HistoryConfig`
    #[uniffi::constructor]
    pub fn new(
        store: Arc<EntryStore>,
        bus: Arc<SignalBus>,
        monitor: Option<Arc<ClipboardMonitor>>,
    ) -> Arc<Self> {
        let polling_interval = store.config().polling_interval();
        Arc::new(Self {
            store,
            bus,
            monitor,
            polling_interval,
            running: Mutex::new(None),
        })
    }

    /// Register the signal observer, subscribe to local changes and start
    /// the polling timer. Calling it while running does nothing.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            return;
        }

        let weak_store = Arc::downgrade(&self.store);
        let observer = self.bus.observe(move || {
            if let Some(store) = weak_store.upgrade() {
                store.reload();
            }
        });

        let subscription = self.store.subscribe(Arc::new(SignalForwarder {
            bus: Arc::clone(&self.bus),
            store: Arc::downgrade(&self.store),
        }));

        let timer = self.spawn_timer();
        *running = Some(Running {
            observer,
            subscription,
            _timer: timer,
        });
        drop(running);

        // Catch up on anything written while this process was not listening
        self.store.reload();
        info!(
            signal = %self.bus.name(),
            interval_ms = self.polling_interval.as_millis() as u64,
            has_monitor = self.monitor.is_some(),
            "Sync started"
        );
    }

    /// Deregister the signal observer, unsubscribe and cancel the timer.
    /// An in-flight reload is not interrupted.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        self.bus.stop_observing(running.observer);
        self.store.unsubscribe(running.subscription);
        drop(running);
        info!(signal = %self.bus.name(), "Sync stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Run one reconciliation now; true when the collection changed
    pub fn reconcile(&self) -> bool {
        self.store.reload()
    }

    /// The OS reported a pasteboard change
    pub fn pasteboard_changed(&self) {
        poll_once(self.monitor.as_deref(), &self.store);
    }

    /// The process returned to the foreground; signals may have been missed while suspended
    pub fn app_foregrounded(&self) {
        debug!("Foregrounded; reconciling");
        poll_once(self.monitor.as_deref(), &self.store);
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use crate::interface::HistoryStoreApi;
    use crate::memory::MemoryStore;
    use crate::interface::{PersistenceAdapter, StorageError};
    use crate::signal::LoopbackTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn config(signal_name: &str) -> HistoryConfig {
        HistoryConfig {
            polling_interval_ms: 50,
            signal_name: signal_name.to_string(),
            ..HistoryConfig::default()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn texts(store: &EntryStore) -> Vec<String> {
        store.entries().into_iter().map(|e| e.text).collect()
    }

    #[test]
    fn test_signal_propagates_local_mutation() {
        let shared = Arc::new(MemoryStore::new());
        let transport = Arc::new(LoopbackTransport::new());
        let cfg = config("test.sync.propagate");

        let app_store = EntryStore::open(shared.clone(), cfg.clone());
        let kb_store = EntryStore::open(shared, cfg.clone());
        let app = SyncCoordinator::new(
            app_store.clone(),
            SignalBus::new(transport.clone(), cfg.signal_name.clone()),
            None,
        );
        let keyboard = SyncCoordinator::new(
            kb_store.clone(),
            SignalBus::new(transport.clone(), cfg.signal_name.clone()),
            None,
        );
        app.start();
        keyboard.start();

        app_store.add("x".to_string());
        // Loopback delivery is synchronous
        assert_eq!(texts(&kb_store), vec!["x"]);

        kb_store.toggle_pin(kb_store.entries()[0].id.clone());
        assert!(app_store.entries()[0].is_pinned);
    }

    #[test]
    fn test_start_is_idempotent_and_stop_deregisters() {
        let transport = Arc::new(LoopbackTransport::new());
        let cfg = config("test.sync.lifecycle");
        let store = EntryStore::open(Arc::new(MemoryStore::new()), cfg.clone());
        let bus = SignalBus::new(transport.clone(), cfg.signal_name.clone());
        let coordinator = SyncCoordinator::new(store, bus, None);

        coordinator.start();
        coordinator.start();
        assert!(coordinator.is_running());
        assert_eq!(transport.observer_count("test.sync.lifecycle"), 1);

        coordinator.stop();
        assert!(!coordinator.is_running());
        assert_eq!(transport.observer_count("test.sync.lifecycle"), 0);

        // Restart after stop
        coordinator.start();
        assert_eq!(transport.observer_count("test.sync.lifecycle"), 1);
    }

    #[test]
    fn test_drop_deregisters() {
        let transport = Arc::new(LoopbackTransport::new());
        let cfg = config("test.sync.drop");
        let store = EntryStore::open(Arc::new(MemoryStore::new()), cfg.clone());
        let bus = SignalBus::new(transport.clone(), cfg.signal_name.clone());
        {
            let coordinator = SyncCoordinator::new(store, bus, None);
            coordinator.start();
            assert_eq!(transport.observer_count("test.sync.drop"), 1);
        }
        assert_eq!(transport.observer_count("test.sync.drop"), 0);
    }

    #[test]
    fn test_timer_converges_without_signal() {
        let shared = Arc::new(MemoryStore::new());
        let cfg = config("test.sync.timer");
        let writer = EntryStore::open(shared.clone(), cfg.clone());
        let reader = EntryStore::open(shared, cfg.clone());

        // The writer never signals; only the reader's timer can pick it up
        let coordinator = SyncCoordinator::new(
            reader.clone(),
            SignalBus::new(Arc::new(LoopbackTransport::new()), cfg.signal_name.clone()),
            None,
        );
        coordinator.start();

        writer.add("polled".to_string());
        assert!(wait_until(|| texts(&reader) == vec!["polled"]));
        coordinator.stop();
    }

    /// Adapter whose writes can be switched off
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: std::sync::atomic::AtomicBool,
    }

    impl PersistenceAdapter for FlakyStore {
        fn get(&self, key: String) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: String, value: Vec<u8>) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::WriteFailed { reason: "read-only".to_string() });
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: String) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_recovered_write_is_signalled() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_writes: std::sync::atomic::AtomicBool::new(false),
        });
        let transport = Arc::new(LoopbackTransport::new());
        let cfg = HistoryConfig {
            polling_interval_ms: 60_000,
            ..config("test.sync.flush")
        };
        let writer = EntryStore::open(flaky.clone(), cfg.clone());
        let coordinator = SyncCoordinator::new(
            writer.clone(),
            SignalBus::new(transport.clone(), cfg.signal_name.clone()),
            None,
        );
        coordinator.start();

        let listener = SignalBus::new(transport, cfg.signal_name.clone());
        let posted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&posted);
        let token = listener.observe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        flaky.fail_writes.store(true, Ordering::SeqCst);
        writer.add("pending".to_string());
        assert_eq!(posted.load(Ordering::SeqCst), 0);

        flaky.fail_writes.store(false, Ordering::SeqCst);
        coordinator.reconcile();
        assert!(!writer.has_unsaved_changes());
        assert_eq!(posted.load(Ordering::SeqCst), 1);

        // A fresh reader sees the flushed entry
        let reader = EntryStore::open(flaky, cfg);
        assert_eq!(texts(&reader), vec!["pending"]);
        listener.stop_observing(token);
    }

    #[test]
    fn test_zero_polling_interval_still_polls() {
        let shared = Arc::new(MemoryStore::new());
        let cfg = HistoryConfig {
            polling_interval_ms: 0,
            ..config("test.sync.zero.interval")
        };
        let writer = EntryStore::open(shared.clone(), cfg.clone());
        let reader = EntryStore::open(shared, cfg.clone());
        let coordinator = SyncCoordinator::new(
            reader.clone(),
            SignalBus::new(Arc::new(LoopbackTransport::new()), cfg.signal_name.clone()),
            None,
        );
        assert_eq!(
            coordinator.polling_interval,
            Duration::from_millis(crate::config::DEFAULT_POLLING_INTERVAL_MS)
        );
        coordinator.start();

        writer.add("polled".to_string());
        assert!(wait_until(|| texts(&reader) == vec!["polled"]));
        coordinator.stop();
    }

    #[test]
    fn test_stopped_coordinator_ignores_signals() {
        let shared = Arc::new(MemoryStore::new());
        let transport = Arc::new(LoopbackTransport::new());
        // No timer round can be in flight when the writer adds
        let cfg = HistoryConfig {
            polling_interval_ms: 60_000,
            ..config("test.sync.stopped")
        };
        let writer = EntryStore::open(shared.clone(), cfg.clone());
        let reader = EntryStore::open(shared, cfg.clone());
        let coordinator = SyncCoordinator::new(
            reader.clone(),
            SignalBus::new(transport.clone(), cfg.signal_name.clone()),
            None,
        );
        coordinator.start();
        coordinator.stop();

        writer.add("late".to_string());
        SignalBus::new(transport, cfg.signal_name.clone()).post();
        assert!(reader.is_empty());

        assert!(coordinator.reconcile());
        assert_eq!(texts(&reader), vec!["late"]);
    }
}
