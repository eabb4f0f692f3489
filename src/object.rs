//! Observable property bags.
//!
//! `ObjectRef` stands in for the host's view-model objects and render
//! targets: a shared, identity-compared map of named properties where
//! every property can be observed. Writing a different value notifies the
//! property's subscribers synchronously with `(new, previous)`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::observation::{Subscriber, SubscriberCollection, SubscriberId};
use crate::value::Value;

#[derive(Default)]
struct ObjectData {
    properties: RefCell<BTreeMap<String, Value>>,
    observers: RefCell<HashMap<String, Rc<SubscriberCollection>>>,
}

/// Shared handle to an observable object.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<ObjectData>);

impl ObjectRef {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from `(name, value)` pairs.
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let object = Self::new();
        object
            .0
            .properties
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        object
    }

    /// Identity of the underlying allocation.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read a property; absent properties are `Undefined`.
    #[must_use]
    pub fn get(&self, name: &str) -> Value {
        self.0
            .properties
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.0.properties.borrow().contains_key(name)
    }

    /// Write a property and notify its subscribers if the value changed.
    ///
    /// Returns true when the value changed.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let previous = {
            let mut properties = self.0.properties.borrow_mut();
            let previous = properties
                .insert(name.to_string(), value.clone())
                .unwrap_or_default();
            if previous == value {
                return false;
            }
            previous
        };

        let observers = self.0.observers.borrow().get(name).cloned();
        if let Some(observers) = observers {
            observers.notify(&value, &previous);
        }
        true
    }

    /// Property names in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.properties.borrow().keys().cloned().collect()
    }

    /// Snapshot of all properties in name order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .properties
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.properties.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.properties.borrow().is_empty()
    }

    /// Subscribe to changes of one property.
    pub fn subscribe(&self, name: &str, subscriber: Weak<dyn Subscriber>) -> SubscriberId {
        let collection = Rc::clone(
            self.0
                .observers
                .borrow_mut()
                .entry(name.to_string())
                .or_default(),
        );
        collection.add(subscriber)
    }

    /// Remove a property subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, name: &str, id: SubscriberId) -> bool {
        let mut observers = self.0.observers.borrow_mut();
        let Some(collection) = observers.get(name) else {
            return false;
        };
        let removed = collection.remove(id);
        if collection.is_empty() {
            observers.remove(name);
        }
        removed
    }

    /// Number of subscribers watching `name`.
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.0
            .observers
            .borrow()
            .get(name)
            .map_or(0, |c| c.len())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x}, {:?})", self.id(), self.keys())
    }
}
