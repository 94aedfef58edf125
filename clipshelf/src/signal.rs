//! Cross-process change signal
//!
//! The OS primitive (Darwin notify center) carries no payload and calls a
//! plain C function with an opaque context pointer. We therefore register a
//! numeric token with the transport and keep `token → callback` in a
//! process-wide registry; [`deliver_signal`] is the single trampoline that
//! resolves a token back to its callback.
//!
//! A signal only means "shared state changed, go re-read it".

use crate::interface::SignalTransport;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub type SignalCallback = Arc<dyn Fn() + Send + Sync>;

/// Process-wide `token → callback` registry
static REGISTRY: Lazy<Mutex<HashMap<u64, SignalCallback>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Zero is never handed out so a null context pointer never resolves
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

impl ObserverToken {
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Whether the registry still holds a callback for this token
    pub fn is_registered(&self) -> bool {
        REGISTRY.lock().contains_key(&self.0)
    }
}

/// Trampoline called by every transport when a signal arrives.
/// Unknown tokens (already deregistered) are ignored.
#[uniffi::export]
pub fn deliver_signal(token: u64) {
    let callback = REGISTRY.lock().get(&token).cloned();
    match callback {
        Some(callback) => callback(),
        None => trace!(token, "Dropping signal for unregistered observer"),
    }
}

/// Publish/observe handle for one named signal
#[derive(uniffi::Object)]
pub struct SignalBus {
    transport: Arc<dyn SignalTransport>,
    name: String,
}

impl SignalBus {
    /// Run `callback` whenever the signal is posted by any process, this one included
    pub fn observe<F>(&self, callback: F) -> ObserverToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::SeqCst);
        REGISTRY.lock().insert(token, Arc::new(callback));
        self.transport.add_observer(self.name.clone(), token);
        debug!(token, name = %self.name, "Observing signal");
        ObserverToken(token)
    }

    /// Deregister from the transport first so no delivery races the registry removal
    pub fn stop_observing(&self, token: ObserverToken) {
        self.transport.remove_observer(token.0);
        REGISTRY.lock().remove(&token.0);
        debug!(token = token.0, name = %self.name, "Stopped observing signal");
    }
}

#[uniffi::export]
impl SignalBus {
    #[uniffi::constructor]
    pub fn new(transport: Arc<dyn SignalTransport>, name: String) -> Arc<Self> {
        Arc::new(Self { transport, name })
    }

    /// Broadcast the signal to every process on the device
    pub fn post(&self) {
        trace!(name = %self.name, "Posting signal");
        self.transport.post(self.name.clone());
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }
}

/// Device-wide center that lives inside one process.
/// Used by tests and by hosts that run both halves in a single process.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    observers: Mutex<HashMap<String, Vec<u64>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer_count(&self, name: &str) -> usize {
        self.observers.lock().get(name).map_or(0, Vec::len)
    }
}

impl SignalTransport for LoopbackTransport {
    fn post(&self, name: String) {
        let tokens = self.observers.lock().get(&name).cloned().unwrap_or_default();
        for token in tokens {
            deliver_signal(token);
        }
    }

    fn add_observer(&self, name: String, token: u64) {
        self.observers.lock().entry(name).or_default().push(token);
    }

    fn remove_observer(&self, token: u64) {
        let mut observers = self.observers.lock();
        for tokens in observers.values_mut() {
            tokens.retain(|t| *t != token);
        }
        observers.retain(|_, tokens| !tokens.is_empty());
    }
}

#[uniffi::export]
pub fn new_loopback_transport() -> Arc<dyn SignalTransport> {
    Arc::new(LoopbackTransport::new())
}
