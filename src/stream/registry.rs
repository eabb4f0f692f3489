//! Weak stream-to-observer mapping.
//!
//! # Invariants
//!
//! 1. At most one live observer per live stream instance.
//! 2. Entries never keep a stream or an observer alive.
//! 3. A destroyed observer is never handed out again; the next request opens
//!    a fresh one.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::{stream_key, Stream, StreamObserver, StreamRef};
use crate::config::RegistryConfig;

struct RegistryEntry {
    stream: Weak<dyn Stream>,
    observer: Weak<StreamObserver>,
}

impl RegistryEntry {
    fn live_observer(&self) -> Option<Rc<StreamObserver>> {
        if self.stream.strong_count() == 0 {
            return None;
        }
        self.observer.upgrade().filter(|o| !o.is_destroyed())
    }
}

/// Memoizes one [`StreamObserver`] per stream instance.
///
/// Owned by the binding system; there is no process-wide instance.
pub struct StreamRegistry {
    config: RegistryConfig,
    entries: RefCell<HashMap<usize, RegistryEntry>>,
    opened: Cell<u64>,
}

impl StreamRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: RefCell::new(HashMap::new()),
            opened: Cell::new(0),
        }
    }

    /// Observer for `stream`, opening its subscription on first request.
    pub fn observer_for(&self, stream: &StreamRef) -> Rc<StreamObserver> {
        let key = stream_key(stream);
        if let Some(observer) = self
            .entries
            .borrow()
            .get(&key)
            .and_then(RegistryEntry::live_observer)
        {
            return observer;
        }

        // Subscribing may synchronously deliver a value; keep the map unborrowed.
        let observer = StreamObserver::open(stream);
        self.opened.set(self.opened.get() + 1);

        if self.entries.borrow().len() >= self.config.prune_threshold.max(1) {
            self.prune();
        }
        self.entries.borrow_mut().insert(
            key,
            RegistryEntry {
                stream: Rc::downgrade(stream),
                observer: Rc::downgrade(&observer),
            },
        );
        observer
    }

    /// Live observer for `stream`, without opening one.
    #[must_use]
    pub fn get(&self, stream: &StreamRef) -> Option<Rc<StreamObserver>> {
        self.entries
            .borrow()
            .get(&stream_key(stream))
            .and_then(RegistryEntry::live_observer)
    }

    /// Number of entries with a live stream and a live observer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|e| e.live_observer().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total stream subscriptions opened over the registry's lifetime.
    #[must_use]
    pub fn subscriptions_opened(&self) -> u64 {
        self.opened.get()
    }

    /// Drop entries whose stream or observer is gone. Returns how many.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, e| e.live_observer().is_some());
        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(pruned, remaining = entries.len(), "pruned stream registry");
        }
        pruned
    }

    /// Destroy every live observer and forget all entries.
    pub fn clear(&self) {
        let live: Vec<Rc<StreamObserver>> = self
            .entries
            .borrow_mut()
            .drain()
            .filter_map(|(_, e)| e.live_observer())
            .collect();
        for observer in &live {
            observer.destroy();
        }
        debug!(destroyed = live.len(), "stream registry cleared");
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("entries", &self.entries.borrow().len())
            .field("opened", &self.opened.get())
            .finish()
    }
}
