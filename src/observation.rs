//! Change observation plumbing.
//!
//! Both sources of change a binding listens to, ordinary object properties
//! and stream observers, speak the same [`Subscriber`] contract and keep
//! their listeners in a [`SubscriberCollection`]. A binding records what it
//! observed during an evaluation in an [`ObservationRecord`]; each record
//! entry owns the registration and releases it when dropped.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Notification iterates a snapshot, so subscribers may register or
//!    unregister (themselves or others) while a notification is running.
//! 3. A record holds at most one registration per observed source.
//! 4. Dropping a record entry unregisters it before the next notification.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::object::ObjectRef;
use crate::stream::StreamObserver;
use crate::value::Value;

/// Receives change notifications from a property or a stream observer.
pub trait Subscriber {
    /// Called synchronously with the new value and the value it replaced.
    fn handle_change(&self, new_value: &Value, previous_value: &Value);
}

/// Dependency-recording context used while evaluating an expression.
///
/// Evaluation reports every property it reads and every stream observer
/// it reads through, so the tracker can subscribe to them.
pub trait ChangeTracker {
    /// Record that `name` was read on `object`.
    fn observe_property(&self, object: &ObjectRef, name: &str);

    /// Record that the current value of `observer` was read.
    fn observe_stream(&self, observer: &Rc<StreamObserver>);
}

/// Token identifying one registration inside a [`SubscriberCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Ordered set of weakly held subscribers.
#[derive(Default)]
pub struct SubscriberCollection {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(SubscriberId, Weak<dyn Subscriber>)>>,
}

impl SubscriberCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; it is notified after every earlier one.
    pub fn add(&self, subscriber: Weak<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push((id, subscriber));
        id
    }

    /// Remove a registration. Returns false if it was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Notify every live subscriber in registration order.
    pub fn notify(&self, new_value: &Value, previous_value: &Value) {
        let snapshot: Vec<Weak<dyn Subscriber>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|(_, weak)| weak.strong_count() > 0);
            entries.iter().map(|(_, weak)| Weak::clone(weak)).collect()
        };

        for weak in snapshot {
            if let Some(subscriber) = weak.upgrade() {
                subscriber.handle_change(new_value, previous_value);
            }
        }
    }
}

impl std::fmt::Debug for SubscriberCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberCollection")
            .field("len", &self.len())
            .finish()
    }
}

/// A live registration; unregisters on drop.
enum Registration {
    Property {
        object: ObjectRef,
        name: String,
        id: SubscriberId,
    },
    Stream {
        observer: Rc<StreamObserver>,
        id: SubscriberId,
    },
}

impl Registration {
    fn is_property(&self, object: &ObjectRef, name: &str) -> bool {
        matches!(self, Self::Property { object: o, name: n, .. } if o.ptr_eq(object) && n == name)
    }

    fn is_stream(&self, observer: &Rc<StreamObserver>) -> bool {
        matches!(self, Self::Stream { observer: o, .. } if Rc::ptr_eq(o, observer))
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        match self {
            Self::Property { object, name, id } => {
                object.unsubscribe(name, *id);
            }
            Self::Stream { observer, id } => {
                observer.unsubscribe(*id);
            }
        }
    }
}

struct Observation {
    version: u64,
    registration: Registration,
}

/// Versioned set of observations made by one binding.
///
/// Each evaluation starts a new version; sources read again are re-stamped
/// without re-subscribing, and [`clear_stale`](Self::clear_stale) drops the
/// ones the latest evaluation no longer read.
#[derive(Default)]
pub struct ObservationRecord {
    version: Cell<u64>,
    entries: RefCell<Vec<Observation>>,
}

impl ObservationRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version token.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// Start a new evaluation round.
    pub fn next_version(&self) -> u64 {
        let next = self.version.get().wrapping_add(1);
        self.version.set(next);
        next
    }

    /// Record a property read, subscribing `subscriber` on first sight.
    pub fn observe_property(
        &self,
        object: &ObjectRef,
        name: &str,
        subscriber: &Weak<dyn Subscriber>,
    ) {
        let version = self.version.get();
        {
            let mut entries = self.entries.borrow_mut();
            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.registration.is_property(object, name))
            {
                entry.version = version;
                return;
            }
        }

        let id = object.subscribe(name, Weak::clone(subscriber));
        self.entries.borrow_mut().push(Observation {
            version,
            registration: Registration::Property {
                object: object.clone(),
                name: name.to_string(),
                id,
            },
        });
    }

    /// Record a stream read, subscribing `subscriber` on first sight.
    pub fn observe_stream(&self, observer: &Rc<StreamObserver>, subscriber: &Weak<dyn Subscriber>) {
        let version = self.version.get();
        {
            let mut entries = self.entries.borrow_mut();
            if let Some(entry) = entries.iter_mut().find(|e| e.registration.is_stream(observer)) {
                entry.version = version;
                return;
            }
        }

        let id = observer.subscribe(Weak::clone(subscriber));
        self.entries.borrow_mut().push(Observation {
            version,
            registration: Registration::Stream {
                observer: Rc::clone(observer),
                id,
            },
        });
    }

    /// Drop every observation not re-stamped with the current version.
    ///
    /// Returns the number of observations released.
    pub fn clear_stale(&self) -> usize {
        let version = self.version.get();
        let stale: Vec<Observation> = {
            let mut entries = self.entries.borrow_mut();
            let (keep, stale): (Vec<_>, Vec<_>) =
                entries.drain(..).partition(|e| e.version == version);
            *entries = keep;
            stale
        };
        // Unregister outside the borrow: teardown may reach other bindings.
        let released = stale.len();
        drop(stale);
        released
    }

    /// Drop every observation.
    pub fn clear(&self) {
        let all = std::mem::take(&mut *self.entries.borrow_mut());
        drop(all);
    }

    /// Number of live observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Number of stream observers currently observed.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| matches!(e.registration, Registration::Stream { .. }))
            .count()
    }
}

impl std::fmt::Debug for ObservationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationRecord")
            .field("version", &self.version.get())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<(Value, Value)>>,
    }

    impl Subscriber for Recorder {
        fn handle_change(&self, new_value: &Value, previous_value: &Value) {
            self.seen
                .borrow_mut()
                .push((new_value.clone(), previous_value.clone()));
        }
    }

    fn weak_of(rc: &Rc<Recorder>) -> Weak<dyn Subscriber> {
        let weak: Weak<dyn Subscriber> = Rc::downgrade(rc) as Weak<dyn Subscriber>;
        weak
    }

    #[test]
    fn collection_notifies_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Tagged(&'static str, Rc<RefCell<Vec<&'static str>>>);
        impl Subscriber for Tagged {
            fn handle_change(&self, _: &Value, _: &Value) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let a = Rc::new(Tagged("a", Rc::clone(&order)));
        let b = Rc::new(Tagged("b", Rc::clone(&order)));
        let collection = SubscriberCollection::new();
        collection.add(Rc::downgrade(&a) as Weak<dyn Subscriber>);
        collection.add(Rc::downgrade(&b) as Weak<dyn Subscriber>);

        collection.notify(&Value::Int(1), &Value::Undefined);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn collection_remove_and_dead_entries() {
        let live = Rc::new(Recorder::default());
        let collection = SubscriberCollection::new();
        let id = collection.add(weak_of(&live));
        {
            let dead = Rc::new(Recorder::default());
            collection.add(weak_of(&dead));
        }
        assert_eq!(collection.len(), 2);

        collection.notify(&Value::Int(1), &Value::Int(0));
        assert_eq!(collection.len(), 1);
        assert_eq!(live.seen.borrow().len(), 1);

        assert!(collection.remove(id));
        assert!(!collection.remove(id));
        assert!(collection.is_empty());
    }

    #[test]
    fn record_restamps_without_resubscribing() {
        let recorder = Rc::new(Recorder::default());
        let subscriber = weak_of(&recorder);
        let object = ObjectRef::new();
        let record = ObservationRecord::new();

        record.next_version();
        record.observe_property(&object, "name", &subscriber);
        record.next_version();
        record.observe_property(&object, "name", &subscriber);

        assert_eq!(record.len(), 1);
        assert_eq!(object.subscriber_count("name"), 1);
        assert_eq!(record.clear_stale(), 0);
    }

    #[test]
    fn record_clear_stale_releases_unread_sources() {
        let recorder = Rc::new(Recorder::default());
        let subscriber = weak_of(&recorder);
        let object = ObjectRef::new();
        let record = ObservationRecord::new();

        record.next_version();
        record.observe_property(&object, "a", &subscriber);
        record.observe_property(&object, "b", &subscriber);
        record.next_version();
        record.observe_property(&object, "b", &subscriber);

        assert_eq!(record.clear_stale(), 1);
        assert_eq!(object.subscriber_count("a"), 0);
        assert_eq!(object.subscriber_count("b"), 1);

        record.clear();
        assert!(record.is_empty());
        assert_eq!(object.subscriber_count("b"), 0);
    }
}
