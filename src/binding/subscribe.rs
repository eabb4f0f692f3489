//! The subscribe binding: one expression driving one target property.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::ast::Expr;
use crate::error::{BindError, BindResult, ExpressionError};
use crate::eval::{EvalContext, EvalFlags, Services};
use crate::object::ObjectRef;
use crate::observation::{ChangeTracker, ObservationRecord, Subscriber};
use crate::scope::Scope;
use crate::stream::StreamObserver;
use crate::value::Value;

/// Unique identifier for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(Uuid);

impl BindingId {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum BindingState {
    Unbound,
    Bound {
        scope: Rc<Scope>,
        host_scope: Option<Rc<Scope>>,
    },
}

/// Keeps `target[property]` equal to the value of an expression.
///
/// Lifecycle is `unbound -> bound -> unbound`. While bound, the binding is
/// subscribed to every property and stream observer its last evaluation
/// read; any of them changing re-evaluates the expression and rewrites the
/// target. Unbinding releases all of those subscriptions.
pub struct SubscribeBinding {
    id: BindingId,
    this: Weak<SubscribeBinding>,
    expression: Rc<Expr>,
    target: ObjectRef,
    property: String,
    services: Rc<Services>,
    flags: EvalFlags,
    state: RefCell<BindingState>,
    observations: ObservationRecord,
    value: RefCell<Value>,
    last_error: RefCell<Option<BindError>>,
}

impl SubscribeBinding {
    /// Create an unbound binding.
    #[must_use]
    pub fn new(
        expression: Rc<Expr>,
        target: ObjectRef,
        property: impl Into<String>,
        services: Rc<Services>,
        flags: EvalFlags,
    ) -> Rc<Self> {
        let property = property.into();
        Rc::new_cyclic(|this| Self {
            id: BindingId::new(),
            this: Weak::clone(this),
            expression,
            target,
            property,
            services,
            flags,
            state: RefCell::new(BindingState::Unbound),
            observations: ObservationRecord::new(),
            value: RefCell::new(Value::Undefined),
            last_error: RefCell::new(None),
        })
    }

    /// Evaluate against `scope`, start observing, and write the target.
    ///
    /// Binding again to the same scope is a no-op; binding to a different
    /// scope unbinds first.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error; the binding is left unbound with no
    /// observations and the target untouched.
    pub fn bind(&self, scope: Rc<Scope>, host_scope: Option<Rc<Scope>>) -> BindResult<()> {
        if let BindingState::Bound { scope: current, .. } = &*self.state.borrow() {
            if Rc::ptr_eq(current, &scope) {
                return Ok(());
            }
        }
        self.unbind();

        *self.state.borrow_mut() = BindingState::Bound {
            scope: Rc::clone(&scope),
            host_scope: host_scope.clone(),
        };
        self.observations.next_version();
        match self.evaluate(&scope, host_scope.as_deref()) {
            Ok(value) => {
                self.observations.clear_stale();
                self.write_target(value);
                debug!(
                    binding = %self.id,
                    property = %self.property,
                    observations = self.observations.len(),
                    "binding bound"
                );
                Ok(())
            }
            Err(e) => {
                *self.state.borrow_mut() = BindingState::Unbound;
                self.observations.clear();
                Err(e.into())
            }
        }
    }

    /// Stop observing. Idempotent.
    pub fn unbind(&self) {
        let was_bound = matches!(
            std::mem::replace(&mut *self.state.borrow_mut(), BindingState::Unbound),
            BindingState::Bound { .. }
        );
        if was_bound {
            self.observations.clear();
            debug!(binding = %self.id, property = %self.property, "binding unbound");
        }
    }

    /// Write `value` back through the expression.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::NotBound`] when unbound, and
    /// [`ExpressionError::NotAssignable`] for stream-derived expressions; in
    /// both cases nothing is written.
    pub fn update_source(&self, value: Value) -> BindResult<()> {
        let (scope, host_scope) = self.bound_scopes().ok_or_else(|| BindError::NotBound {
            property: self.property.clone(),
        })?;
        let ctx = EvalContext::new(self.flags, &scope, &self.services)
            .with_host_scope(host_scope.as_deref());
        self.expression.assign(&ctx, value)?;
        Ok(())
    }

    fn bound_scopes(&self) -> Option<(Rc<Scope>, Option<Rc<Scope>>)> {
        match &*self.state.borrow() {
            BindingState::Bound { scope, host_scope } => {
                Some((Rc::clone(scope), host_scope.clone()))
            }
            BindingState::Unbound => None,
        }
    }

    fn evaluate(
        &self,
        scope: &Scope,
        host_scope: Option<&Scope>,
    ) -> Result<Value, ExpressionError> {
        let ctx = EvalContext::new(self.flags, scope, &self.services).with_host_scope(host_scope);
        self.expression.evaluate(&ctx, Some(self as &dyn ChangeTracker))
    }

    fn write_target(&self, value: Value) {
        self.value.replace(value.clone());
        self.target.set(&self.property, value);
    }

    fn subscriber(&self) -> Weak<dyn Subscriber> {
        let weak: Weak<dyn Subscriber> = Weak::clone(&self.this) as Weak<dyn Subscriber>;
        weak
    }

    #[must_use]
    pub const fn id(&self) -> BindingId {
        self.id
    }

    #[must_use]
    pub const fn expression(&self) -> &Rc<Expr> {
        &self.expression
    }

    #[must_use]
    pub const fn target(&self) -> &ObjectRef {
        &self.target
    }

    /// Target property name, after attribute mapping.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    #[must_use]
    pub const fn flags(&self) -> EvalFlags {
        self.flags
    }

    /// Last value written to the target.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Error from the most recent failed re-evaluation, if it has not
    /// been superseded by a successful one.
    #[must_use]
    pub fn last_error(&self) -> Option<BindError> {
        self.last_error.borrow().clone()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(*self.state.borrow(), BindingState::Bound { .. })
    }

    /// Number of properties and streams currently observed.
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    /// Number of stream observers currently observed.
    #[must_use]
    pub fn stream_observation_count(&self) -> usize {
        self.observations.stream_count()
    }
}

impl Subscriber for SubscribeBinding {
    fn handle_change(&self, _new_value: &Value, _previous_value: &Value) {
        let Some((scope, host_scope)) = self.bound_scopes() else {
            return;
        };
        self.observations.next_version();
        match self.evaluate(&scope, host_scope.as_deref()) {
            Ok(value) => {
                self.observations.clear_stale();
                self.last_error.replace(None);
                self.write_target(value);
            }
            Err(e) => {
                error!(
                    binding = %self.id,
                    property = %self.property,
                    error = %e,
                    "binding update failed; keeping previous value"
                );
                self.last_error.replace(Some(e.into()));
            }
        }
    }
}

impl ChangeTracker for SubscribeBinding {
    fn observe_property(&self, object: &ObjectRef, name: &str) {
        self.observations.observe_property(object, name, &self.subscriber());
    }

    fn observe_stream(&self, observer: &Rc<StreamObserver>) {
        self.observations.observe_stream(observer, &self.subscriber());
    }
}

impl fmt::Debug for SubscribeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeBinding")
            .field("id", &self.id)
            .field("property", &self.property)
            .field("bound", &self.is_bound())
            .field("value", &*self.value.borrow())
            .field("observations", &self.observations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::rebase;
    use crate::stream::{StreamRef, Subject};

    fn bind_to(
        model: &ObjectRef,
        expression: Rc<Expr>,
        services: &Rc<Services>,
    ) -> (Rc<SubscribeBinding>, ObjectRef) {
        let target = ObjectRef::new();
        let binding = SubscribeBinding::new(
            rebase(&expression).unwrap(),
            target.clone(),
            "textContent",
            Rc::clone(services),
            EvalFlags::strict(),
        );
        binding.bind(Rc::new(Scope::new(model.clone())), None).unwrap();
        (binding, target)
    }

    #[test]
    fn test_bind_writes_target_and_tracks_stream() {
        let subject = Subject::behavior(Value::from("Ann"));
        let model = ObjectRef::from_entries([("name$", Value::Stream(subject.clone()))]);
        let services = Rc::new(Services::default());
        let (binding, target) = bind_to(&model, Expr::scope("name$"), &services);

        assert!(binding.is_bound());
        assert_eq!(target.get("textContent"), Value::from("Ann"));
        assert_eq!(binding.stream_observation_count(), 1);

        subject.next(Value::from("Bea"));
        assert_eq!(target.get("textContent"), Value::from("Bea"));
        assert_eq!(binding.value(), Value::from("Bea"));
    }

    #[test]
    fn test_unbind_releases_everything() {
        let subject = Subject::new();
        let model = ObjectRef::from_entries([("name$", Value::Stream(subject.clone()))]);
        let services = Rc::new(Services::default());
        let (binding, target) = bind_to(&model, Expr::scope("name$"), &services);
        assert_eq!(subject.subscriber_count(), 1);
        assert_eq!(model.subscriber_count("name$"), 1);

        binding.unbind();
        binding.unbind();
        assert!(!binding.is_bound());
        assert_eq!(binding.observation_count(), 0);
        assert_eq!(subject.subscriber_count(), 0);
        assert_eq!(model.subscriber_count("name$"), 0);

        subject.next(Value::from("late"));
        assert_eq!(target.get("textContent"), Value::from(""));
    }

    #[test]
    fn test_replacing_stream_property_switches_subscription() {
        let first = Subject::behavior(Value::Int(1));
        let second = Subject::behavior(Value::Int(2));
        let model = ObjectRef::from_entries([("n$", Value::Stream(first.clone()))]);
        let services = Rc::new(Services::default());
        let (binding, target) = bind_to(&model, Expr::scope("n$"), &services);
        assert_eq!(target.get("textContent"), Value::Int(1));

        let replacement: StreamRef = second.clone();
        model.set("n$", Value::Stream(replacement));
        assert_eq!(target.get("textContent"), Value::Int(2));
        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 1);
        assert_eq!(binding.stream_observation_count(), 1);
    }

    #[test]
    fn test_update_source_on_stream_is_not_assignable() {
        let subject = Subject::behavior(Value::from("Ann"));
        let model = ObjectRef::from_entries([("name$", Value::Stream(subject.clone()))]);
        let services = Rc::new(Services::default());
        let (binding, target) = bind_to(&model, Expr::scope("name$"), &services);

        let err = binding.update_source(Value::from("Zed")).unwrap_err();
        assert!(err.is_not_assignable());
        assert_eq!(target.get("textContent"), Value::from("Ann"));
        assert!(model.get("name$").is_stream());
    }

    #[test]
    fn test_update_source_requires_bound() {
        let binding = SubscribeBinding::new(
            Expr::scope("name"),
            ObjectRef::new(),
            "value",
            Rc::new(Services::default()),
            EvalFlags::default(),
        );
        assert!(matches!(
            binding.update_source(Value::Int(1)),
            Err(BindError::NotBound { .. })
        ));
    }

    #[test]
    fn test_failed_bind_leaves_binding_unbound() {
        let model = ObjectRef::from_entries([("name", Value::from("Ann"))]);
        let target = ObjectRef::new();
        let binding = SubscribeBinding::new(
            Expr::converter(Expr::scope("name"), "missing", Vec::new()),
            target.clone(),
            "value",
            Rc::new(Services::default()),
            EvalFlags::strict(),
        );

        let err = binding.bind(Rc::new(Scope::new(model.clone())), None).unwrap_err();
        assert!(err.is_expression());
        assert!(!binding.is_bound());
        assert_eq!(binding.observation_count(), 0);
        assert_eq!(model.subscriber_count("name"), 0);
        assert!(!target.has("value"));
    }

    #[test]
    fn test_rebind_same_scope_is_noop() {
        let model = ObjectRef::from_entries([("name", Value::from("Ann"))]);
        let scope = Rc::new(Scope::new(model.clone()));
        let binding = SubscribeBinding::new(
            Expr::scope("name"),
            ObjectRef::new(),
            "value",
            Rc::new(Services::default()),
            EvalFlags::strict(),
        );

        binding.bind(Rc::clone(&scope), None).unwrap();
        binding.bind(Rc::clone(&scope), None).unwrap();
        assert_eq!(model.subscriber_count("name"), 1);
    }
}
