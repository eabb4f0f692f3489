//! Stream subsystem.
//!
//! A stream is any push-based value source that can be subscribed to. The
//! binding layer never talks to streams directly: it goes through the
//! [`StreamRegistry`], which hands out one memoized [`StreamObserver`] per
//! live stream instance. The observer holds the single subscription, caches
//! the latest value and fans changes out to interested bindings.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Memoized per-stream observer.
pub mod observer;
/// Stream to observer mapping.
pub mod registry;
/// Reference push stream.
pub mod subject;

pub use observer::{ObserverId, ObserverState, StreamObserver};
pub use registry::StreamRegistry;
pub use subject::Subject;

/// Signal delivered by a stream to its sinks.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new value.
    Next(Value),
    /// The stream failed; no further values follow.
    Error(String),
    /// The stream finished; no further values follow.
    Complete,
}

/// Callback receiving stream events.
pub type StreamSink = Rc<dyn Fn(&StreamEvent)>;

/// Push-based asynchronous value source.
///
/// Only the subscribe / emit / unsubscribe contract is relied upon.
/// Implementations must deliver events synchronously and in order, and may
/// deliver a current value during `subscribe` itself.
pub trait Stream {
    /// Start delivering events to `sink` until the returned handle is
    /// unsubscribed or dropped.
    fn subscribe(&self, sink: StreamSink) -> StreamSubscription;
}

/// Shared handle to a stream; identity is the allocation.
pub type StreamRef = Rc<dyn Stream>;

/// Identity key of a stream handle.
#[must_use]
pub fn stream_key(stream: &StreamRef) -> usize {
    Rc::as_ptr(stream).cast::<()>() as usize
}

/// Live stream subscription.
///
/// Unsubscribing is idempotent; dropping the handle unsubscribes.
pub struct StreamSubscription {
    teardown: Cell<Option<Box<dyn FnOnce()>>>,
}

impl StreamSubscription {
    /// Subscription that runs `teardown` once when released.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Cell::new(Some(Box::new(teardown))),
        }
    }

    /// Subscription with nothing to release.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            teardown: Cell::new(None),
        }
    }

    /// Release the subscription.
    pub fn unsubscribe(&self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// True once released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let teardown = self.teardown.take();
        let closed = teardown.is_none();
        self.teardown.set(teardown);
        closed
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for StreamSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_teardown_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let subscription = StreamSubscription::new(move || counter.set(counter.get() + 1));

        assert!(!subscription.is_closed());
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(subscription.is_closed());
        drop(subscription);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        drop(StreamSubscription::new(move || counter.set(counter.get() + 1)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stream_key_is_identity() {
        let a: StreamRef = Subject::new();
        let b: StreamRef = Rc::clone(&a);
        let c: StreamRef = Subject::new();
        assert_eq!(stream_key(&a), stream_key(&b));
        assert_ne!(stream_key(&a), stream_key(&c));
    }
}
