//! Per-stream observer: one subscription, a cached value, many listeners.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{StreamEvent, StreamRef, StreamSink, StreamSubscription};
use crate::error::ExpressionError;
use crate::observation::{Subscriber, SubscriberCollection, SubscriberId};
use crate::value::Value;

/// Unique identifier for a stream observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a [`StreamObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverState {
    /// Subscribed and accepting values.
    Active,
    /// The stream completed; the last value is kept.
    Completed,
    /// The stream failed; the last value is kept.
    Errored,
    /// Torn down; the subscription is released.
    Destroyed,
}

impl ObserverState {
    /// True while stream values are accepted.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Observer of a single stream instance.
///
/// Holds the one subscription to its stream and caches the latest emitted
/// value (`Undefined` until the first emission). Each emission is forwarded
/// to every subscriber with the value it replaced. Once the last subscriber
/// leaves, the observer releases the stream subscription and is marked
/// destroyed; the registry opens a fresh observer on the next request.
pub struct StreamObserver {
    id: ObserverId,
    current: RefCell<Value>,
    subscribers: SubscriberCollection,
    subscription: RefCell<Option<StreamSubscription>>,
    state: Cell<ObserverState>,
}

impl StreamObserver {
    /// Subscribe to `stream` and return the observer holding that subscription.
    ///
    /// A value delivered during subscription is cached before this returns.
    pub(crate) fn open(stream: &StreamRef) -> Rc<Self> {
        let observer = Rc::new(Self {
            id: ObserverId::new(),
            current: RefCell::new(Value::Undefined),
            subscribers: SubscriberCollection::new(),
            subscription: RefCell::new(None),
            state: Cell::new(ObserverState::Active),
        });

        let weak: Weak<Self> = Rc::downgrade(&observer);
        let sink: StreamSink = Rc::new(move |event: &StreamEvent| {
            if let Some(observer) = weak.upgrade() {
                observer.on_event(event);
            }
        });
        let subscription = stream.subscribe(sink);
        if observer.is_destroyed() {
            subscription.unsubscribe();
        } else {
            *observer.subscription.borrow_mut() = Some(subscription);
        }
        debug!(observer = %observer.id, "stream observer opened");
        observer
    }

    fn on_event(&self, event: &StreamEvent) {
        if !self.state.get().is_active() {
            return;
        }
        match event {
            StreamEvent::Next(value) => {
                let previous = self.current.replace(value.clone());
                trace!(
                    observer = %self.id,
                    subscribers = self.subscribers.len(),
                    "stream emitted"
                );
                self.subscribers.notify(value, &previous);
            }
            StreamEvent::Error(message) => {
                warn!(observer = %self.id, error = %message, "stream failed; keeping last value");
                self.state.set(ObserverState::Errored);
            }
            StreamEvent::Complete => {
                debug!(observer = %self.id, "stream completed; keeping last value");
                self.state.set(ObserverState::Completed);
            }
        }
    }

    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Latest emitted value, `Undefined` before the first emission.
    #[must_use]
    pub fn get_value(&self) -> Value {
        self.current.borrow().clone()
    }

    /// Streams are read-only from the binding side.
    ///
    /// # Errors
    ///
    /// Always returns [`ExpressionError::ReadOnlyStream`].
    pub fn set_value(&self, _value: Value) -> Result<(), ExpressionError> {
        Err(ExpressionError::ReadOnlyStream)
    }

    /// Register a listener for future emissions.
    pub fn subscribe(&self, subscriber: Weak<dyn Subscriber>) -> SubscriberId {
        self.subscribers.add(subscriber)
    }

    /// Remove a listener; the last one leaving destroys the observer.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(id);
        if removed && self.subscribers.is_empty() {
            self.destroy();
        }
        removed
    }

    /// Release the stream subscription. Idempotent.
    pub fn destroy(&self) {
        if self.state.get() == ObserverState::Destroyed {
            return;
        }
        self.state.set(ObserverState::Destroyed);
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        debug!(observer = %self.id, "stream observer destroyed");
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn state(&self) -> ObserverState {
        self.state.get()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state.get() == ObserverState::Destroyed
    }
}

impl Drop for StreamObserver {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

impl fmt::Debug for StreamObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamObserver")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("current", &*self.current.borrow())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
