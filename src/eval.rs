//! Expression evaluation and assignment.
//!
//! Evaluation reads values out of a scope chain and reports every property
//! and stream it reads to an optional [`ChangeTracker`]. The stream-aware
//! nodes additionally resolve stream handles through the [`StreamRegistry`]
//! and return the stream's cached value instead of the handle.
//!
//! Two strategies exist, selected by [`EvalFlags::strict`]:
//!
//! - strict: nullish values flow through as-is;
//! - non-strict: absent scope values and member reads on falsy instances
//!   become the empty string, matching how rendered templates show them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExpressionError, Phase};
use crate::object::ObjectRef;
use crate::observation::ChangeTracker;
use crate::scope::{resolve, Scope};
use crate::stream::{StreamObserver, StreamRegistry};
use crate::value::Value;

/// Evaluation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EvalFlags {
    /// Let nullish values through instead of coercing them to `""`.
    pub strict: bool,
    /// Only observe the last property of a member chain.
    pub observe_leaf_properties_only: bool,
}

impl EvalFlags {
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            strict: true,
            observe_leaf_properties_only: false,
        }
    }

    #[must_use]
    pub const fn with_observe_leaf_properties_only(mut self, enabled: bool) -> Self {
        self.observe_leaf_properties_only = enabled;
        self
    }
}

/// Named value transformer applied with `expr | name:args`.
pub trait ValueConverter {
    /// Source-to-view conversion.
    fn to_view(&self, value: Value, args: &[Value]) -> Value;

    /// View-to-source conversion; identity unless overridden.
    fn from_view(&self, value: Value, _args: &[Value]) -> Value {
        value
    }
}

impl<F> ValueConverter for F
where
    F: Fn(Value, &[Value]) -> Value,
{
    fn to_view(&self, value: Value, args: &[Value]) -> Value {
        self(value, args)
    }
}

/// Shared collaborators available to every evaluation.
pub struct Services {
    registry: Rc<StreamRegistry>,
    converters: RefCell<HashMap<String, Rc<dyn ValueConverter>>>,
}

impl Services {
    #[must_use]
    pub fn new(registry: Rc<StreamRegistry>) -> Self {
        Self {
            registry,
            converters: RefCell::new(HashMap::new()),
        }
    }

    /// The stream registry stream-aware nodes resolve through.
    #[must_use]
    pub const fn registry(&self) -> &Rc<StreamRegistry> {
        &self.registry
    }

    /// Register (or replace) a value converter.
    pub fn register_value_converter(
        &self,
        name: impl Into<String>,
        converter: impl ValueConverter + 'static,
    ) {
        self.converters
            .borrow_mut()
            .insert(name.into(), Rc::new(converter));
    }

    #[must_use]
    pub fn value_converter(&self, name: &str) -> Option<Rc<dyn ValueConverter>> {
        self.converters.borrow().get(name).cloned()
    }

    fn require_converter(&self, name: &str) -> Result<Rc<dyn ValueConverter>, ExpressionError> {
        self.value_converter(name)
            .ok_or_else(|| ExpressionError::UnknownValueConverter {
                name: name.to_string(),
            })
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(Rc::new(StreamRegistry::default()))
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.converters.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Services")
            .field("registry", &self.registry)
            .field("converters", &names)
            .finish()
    }
}

/// Everything an evaluation reads from besides the tracker.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub flags: EvalFlags,
    pub scope: &'a Scope,
    pub host_scope: Option<&'a Scope>,
    pub services: &'a Services,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub const fn new(flags: EvalFlags, scope: &'a Scope, services: &'a Services) -> Self {
        Self {
            flags,
            scope,
            host_scope: None,
            services,
        }
    }

    #[must_use]
    pub const fn with_host_scope(mut self, host_scope: Option<&'a Scope>) -> Self {
        self.host_scope = host_scope;
        self
    }

    fn resolve(&self, name: &str, ancestor: u32, access_host_scope: bool) -> Option<ObjectRef> {
        if access_host_scope {
            self.host_scope.and_then(|host| resolve(host, name, ancestor, None))
        } else {
            resolve(self.scope, name, ancestor, self.host_scope)
        }
    }

    /// Evaluate the object part of a member chain.
    ///
    /// In leaf-only mode its property reads go unobserved, but streams it
    /// reads through are still subscribed.
    fn evaluate_object(
        &self,
        object: &Expr,
        tracker: Option<&dyn ChangeTracker>,
    ) -> Result<Value, ExpressionError> {
        match tracker {
            Some(tracker) if self.flags.observe_leaf_properties_only => {
                let streams_only = StreamsOnly(tracker);
                object.evaluate(self, Some(&streams_only as &dyn ChangeTracker))
            }
            _ => object.evaluate(self, tracker),
        }
    }

    /// Swap a stream handle for its observer's cached value, subscribing the tracker.
    fn read_through_stream(&self, value: Value, tracker: Option<&dyn ChangeTracker>) -> Value {
        if let (Some(tracker), Value::Stream(stream)) = (tracker, &value) {
            let observer = self.services.registry().observer_for(stream);
            tracker.observe_stream(&observer);
            return observer.get_value().or_empty();
        }
        value.or_empty()
    }
}

/// Forwards stream reads and drops property reads.
struct StreamsOnly<'t>(&'t dyn ChangeTracker);

impl ChangeTracker for StreamsOnly<'_> {
    fn observe_property(&self, _object: &ObjectRef, _name: &str) {}

    fn observe_stream(&self, observer: &Rc<StreamObserver>) {
        self.0.observe_stream(observer);
    }
}

fn unsupported(expr: &Expr) -> ExpressionError {
    ExpressionError::UnsupportedConstruct {
        kind: expr.kind(),
        phase: Phase::Evaluation,
    }
}

fn not_assignable(expr: &Expr) -> ExpressionError {
    ExpressionError::NotAssignable { kind: expr.kind() }
}

impl Expr {
    /// Evaluate against `ctx`, reporting reads to `tracker`.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnsupportedConstruct`] for node kinds that
    /// cannot be evaluated, and [`ExpressionError::UnknownValueConverter`]
    /// for an unregistered converter.
    pub fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        tracker: Option<&dyn ChangeTracker>,
    ) -> Result<Value, ExpressionError> {
        let strict = ctx.flags.strict;
        match self {
            Self::AccessThis { ancestor } => Ok(ctx
                .scope
                .ancestor(*ancestor)
                .map_or(Value::Undefined, |s| Value::Object(s.binding_context().clone()))),

            Self::AccessScope {
                name,
                ancestor,
                access_host_scope,
            } => {
                let Some(object) = ctx.resolve(name, *ancestor, *access_host_scope) else {
                    return Ok(if strict { Value::Undefined } else { Value::from("") });
                };
                if let Some(tracker) = tracker {
                    tracker.observe_property(&object, name);
                }
                let value = object.get(name);
                Ok(if strict { value } else { value.or_empty() })
            }

            Self::StreamAccessScope {
                name,
                ancestor,
                access_host_scope,
            } => {
                let Some(object) = ctx.resolve(name, *ancestor, *access_host_scope) else {
                    return Ok(Value::from(""));
                };
                if let Some(tracker) = tracker {
                    tracker.observe_property(&object, name);
                }
                Ok(ctx.read_through_stream(object.get(name), tracker))
            }

            Self::AccessMember { object, name } => {
                let instance = ctx.evaluate_object(object, tracker)?;
                if strict {
                    if instance.is_nullish() {
                        return Ok(instance);
                    }
                    if let (Some(tracker), Value::Object(o)) = (tracker, &instance) {
                        tracker.observe_property(o, name);
                    }
                    return Ok(instance.member(name));
                }
                if let (Some(tracker), Value::Object(o)) = (tracker, &instance) {
                    tracker.observe_property(o, name);
                }
                Ok(if instance.is_truthy() {
                    instance.member(name)
                } else {
                    Value::from("")
                })
            }

            Self::StreamAccessMember { object, name } => {
                let instance = ctx.evaluate_object(object, tracker)?;
                if strict && instance.is_nullish() {
                    return Ok(instance);
                }
                if let Value::Object(o) = &instance {
                    if let Some(tracker) = tracker {
                        tracker.observe_property(o, name);
                    }
                    return Ok(ctx.read_through_stream(o.get(name), tracker));
                }
                Ok(if strict || instance.is_truthy() {
                    instance.member(name)
                } else {
                    Value::from("")
                })
            }

            Self::AccessKeyed { object, key } => {
                let instance = ctx.evaluate_object(object, tracker)?;
                let key = key.evaluate(ctx, tracker)?;
                match &instance {
                    Value::Object(o) => {
                        let key = key.to_string();
                        if let Some(tracker) = tracker {
                            tracker.observe_property(o, &key);
                        }
                        Ok(o.get(&key))
                    }
                    Value::Array(items) => Ok(index_of(&key)
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or_default()),
                    _ => Ok(Value::Undefined),
                }
            }

            Self::Unary {
                operation,
                expression,
            } => {
                let value = expression.evaluate(ctx, tracker)?;
                Ok(apply_unary(*operation, &value))
            }

            Self::Binary {
                operation,
                left,
                right,
            } => {
                let lhs = left.evaluate(ctx, tracker)?;
                match operation {
                    BinaryOp::And if !lhs.is_truthy() => Ok(lhs),
                    BinaryOp::Or if lhs.is_truthy() => Ok(lhs),
                    BinaryOp::And | BinaryOp::Or => right.evaluate(ctx, tracker),
                    op => {
                        let rhs = right.evaluate(ctx, tracker)?;
                        Ok(apply_binary(*op, &lhs, &rhs))
                    }
                }
            }

            Self::Conditional { condition, yes, no } => {
                if condition.evaluate(ctx, tracker)?.is_truthy() {
                    yes.evaluate(ctx, tracker)
                } else {
                    no.evaluate(ctx, tracker)
                }
            }

            Self::PrimitiveLiteral { value } => Ok(value.to_value()),

            Self::ArrayLiteral { elements } => {
                Ok(Value::Array(evaluate_all(elements, ctx, tracker)?))
            }

            Self::ObjectLiteral { keys, values } => {
                let values = evaluate_all(values, ctx, tracker)?;
                Ok(Value::Object(ObjectRef::from_entries(
                    keys.iter().cloned().zip(values),
                )))
            }

            Self::Template {
                cooked,
                expressions,
            }
            | Self::StreamTemplate {
                cooked,
                expressions,
            } => render_segments(cooked, expressions, ctx, tracker),

            Self::Interpolation { parts, expressions } => {
                render_segments(parts, expressions, ctx, tracker)
            }

            Self::ValueConverter {
                expression,
                name,
                args,
            } => {
                let converter = ctx.services.require_converter(name)?;
                let value = expression.evaluate(ctx, tracker)?;
                let args = evaluate_all(args, ctx, tracker)?;
                Ok(converter.to_view(value, &args))
            }

            // Arguments are only read for their dependencies; the host applies the behavior.
            Self::BindingBehavior {
                expression, args, ..
            } => {
                let value = expression.evaluate(ctx, tracker)?;
                evaluate_all(args, ctx, tracker)?;
                Ok(value)
            }

            Self::CallScope { .. }
            | Self::CallMember { .. }
            | Self::CallFunction { .. }
            | Self::Assign { .. }
            | Self::TaggedTemplate { .. }
            | Self::HtmlLiteral { .. }
            | Self::ForOfStatement { .. }
            | Self::BindingIdentifier { .. }
            | Self::ArrayBindingPattern { .. }
            | Self::ObjectBindingPattern { .. } => Err(unsupported(self)),
        }
    }

    /// Write `value` through this expression.
    ///
    /// Nothing is written when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::NotAssignable`] for stream-aware nodes and
    /// for expressions that do not denote a writable location.
    pub fn assign(&self, ctx: &EvalContext<'_>, value: Value) -> Result<(), ExpressionError> {
        match self {
            Self::AccessScope {
                name,
                ancestor,
                access_host_scope,
            } => {
                let object = ctx
                    .resolve(name, *ancestor, *access_host_scope)
                    .ok_or_else(|| not_assignable(self))?;
                object.set(name, value);
                Ok(())
            }

            Self::AccessMember { object, name } => match object.evaluate(ctx, None)? {
                Value::Object(o) => {
                    o.set(name, value);
                    Ok(())
                }
                _ => Err(not_assignable(self)),
            },

            Self::AccessKeyed { object, key } => {
                let instance = object.evaluate(ctx, None)?;
                let key = key.evaluate(ctx, None)?;
                match instance {
                    Value::Object(o) => {
                        o.set(&key.to_string(), value);
                        Ok(())
                    }
                    _ => Err(not_assignable(self)),
                }
            }

            Self::ValueConverter {
                expression,
                name,
                args,
            } => {
                let converter = ctx.services.require_converter(name)?;
                let args = evaluate_all(args, ctx, None)?;
                expression.assign(ctx, converter.from_view(value, &args))
            }

            Self::BindingBehavior { expression, .. } => expression.assign(ctx, value),

            _ => Err(not_assignable(self)),
        }
    }
}

fn evaluate_all(
    items: &[Rc<Expr>],
    ctx: &EvalContext<'_>,
    tracker: Option<&dyn ChangeTracker>,
) -> Result<Vec<Value>, ExpressionError> {
    items.iter().map(|e| e.evaluate(ctx, tracker)).collect()
}

fn render_segments(
    segments: &[String],
    expressions: &[Rc<Expr>],
    ctx: &EvalContext<'_>,
    tracker: Option<&dyn ChangeTracker>,
) -> Result<Value, ExpressionError> {
    use std::fmt::Write as _;

    let mut out = segments.first().cloned().unwrap_or_default();
    for (i, expression) in expressions.iter().enumerate() {
        let value = expression.evaluate(ctx, tracker)?;
        let _ = write!(out, "{value}");
        if let Some(segment) = segments.get(i + 1) {
            out.push_str(segment);
        }
    }
    Ok(Value::String(out))
}

fn index_of(key: &Value) -> Option<usize> {
    match key {
        Value::Int(i) => usize::try_from(*i).ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        other => other.as_float().unwrap_or(f64::NAN),
    }
}

fn apply_unary(operation: UnaryOp, value: &Value) -> Value {
    match operation {
        UnaryOp::Not => Value::Bool(!value.is_truthy()),
        UnaryOp::Typeof => Value::from(value.type_name()),
        UnaryOp::Plus => match value {
            Value::Int(i) => Value::Int(*i),
            other => Value::Float(to_number(other)),
        },
        UnaryOp::Negate => match value {
            Value::Int(i) => i
                .checked_neg()
                .map_or_else(|| Value::Float(-to_number(value)), Value::Int),
            other => Value::Float(-to_number(other)),
        },
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(_) | Value::Stream(_) | Value::Array(_), _)
        | (_, Value::Object(_) | Value::Stream(_) | Value::Array(_)) => lhs == rhs,
        _ => to_number(lhs) == to_number(rhs),
    }
}

fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            to_number(lhs) == to_number(rhs)
        }
        _ => lhs == rhs,
    }
}

fn compare(operation: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(lhs).partial_cmp(&to_number(rhs)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match operation {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Le => ordering.is_le(),
        _ => ordering.is_ge(),
    }
}

fn arithmetic(operation: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let exact = match operation {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Div if a.checked_rem(*b) == Some(0) => a.checked_div(*b),
            BinaryOp::Mod => a.checked_rem(*b),
            _ => None,
        };
        if let Some(v) = exact {
            return Value::Int(v);
        }
    }
    let (a, b) = (to_number(lhs), to_number(rhs));
    Value::Float(match operation {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    })
}

fn apply_binary(operation: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match operation {
        BinaryOp::Eq => Value::Bool(loose_eq(lhs, rhs)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(lhs, rhs)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(lhs, rhs)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_eq(lhs, rhs)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            Value::Bool(compare(operation, lhs, rhs))
        }
        BinaryOp::Add if lhs.is_string() || rhs.is_string() => Value::String(format!("{lhs}{rhs}")),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(operation, lhs, rhs)
        }
        BinaryOp::In => Value::Bool(match rhs {
            Value::Object(o) => o.has(&lhs.to_string()),
            Value::Array(items) => index_of(lhs).is_some_and(|i| i < items.len()),
            _ => false,
        }),
        // short-circuited by the caller
        BinaryOp::And | BinaryOp::Or => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::stream::{StreamObserver, StreamRef, Subject};

    #[derive(Default)]
    struct Recorder {
        properties: RefCell<Vec<String>>,
        streams: RefCell<Vec<Rc<StreamObserver>>>,
    }

    impl ChangeTracker for Recorder {
        fn observe_property(&self, _object: &ObjectRef, name: &str) {
            self.properties.borrow_mut().push(name.to_string());
        }

        fn observe_stream(&self, observer: &Rc<StreamObserver>) {
            self.streams.borrow_mut().push(Rc::clone(observer));
        }
    }

    fn stream_node(name: &str) -> Rc<Expr> {
        Rc::new(Expr::StreamAccessScope {
            name: name.to_string(),
            ancestor: 0,
            access_host_scope: false,
        })
    }

    fn int(v: i64) -> Rc<Expr> {
        Expr::literal(Literal::Int(v))
    }

    #[test]
    fn test_scope_access_strict_and_lenient() {
        let scope = Scope::new(ObjectRef::from_entries([("n", Value::Null)]));
        let services = Services::default();

        let strict = EvalContext::new(EvalFlags::strict(), &scope, &services);
        assert_eq!(Expr::scope("n").evaluate(&strict, None).unwrap(), Value::Null);

        let lenient = EvalContext::new(EvalFlags::default(), &scope, &services);
        assert_eq!(Expr::scope("n").evaluate(&lenient, None).unwrap(), Value::from(""));
    }

    #[test]
    fn test_member_access_observes_each_link() {
        let user = ObjectRef::from_entries([("name", Value::from("Ann"))]);
        let scope = Scope::new(ObjectRef::from_entries([("user", Value::Object(user))]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let recorder = Recorder::default();

        let value = Expr::member(Expr::scope("user"), "name")
            .evaluate(&ctx, Some(&recorder))
            .unwrap();
        assert_eq!(value, Value::from("Ann"));
        assert_eq!(*recorder.properties.borrow(), vec!["user", "name"]);
    }

    #[test]
    fn test_leaf_only_skips_object_observation() {
        let user = ObjectRef::from_entries([("name", Value::from("Ann"))]);
        let scope = Scope::new(ObjectRef::from_entries([("user", Value::Object(user))]));
        let services = Services::default();
        let flags = EvalFlags::strict().with_observe_leaf_properties_only(true);
        let ctx = EvalContext::new(flags, &scope, &services);
        let recorder = Recorder::default();

        Expr::member(Expr::scope("user"), "name")
            .evaluate(&ctx, Some(&recorder))
            .unwrap();
        assert_eq!(*recorder.properties.borrow(), vec!["name"]);
    }

    #[test]
    fn test_leaf_only_still_reads_through_object_stream() {
        let user = ObjectRef::from_entries([("name", Value::from("Ann"))]);
        let subject = Subject::behavior(Value::Object(user));
        let scope = Scope::new(ObjectRef::from_entries([(
            "user$",
            Value::Stream(subject.clone()),
        )]));
        let services = Services::default();
        let flags = EvalFlags::strict().with_observe_leaf_properties_only(true);
        let ctx = EvalContext::new(flags, &scope, &services);
        let recorder = Recorder::default();

        let value = Expr::member(stream_node("user$"), "name")
            .evaluate(&ctx, Some(&recorder))
            .unwrap();
        assert_eq!(value, Value::from("Ann"));
        assert_eq!(*recorder.properties.borrow(), vec!["name"]);
        assert_eq!(recorder.streams.borrow().len(), 1);
        assert_eq!(subject.subscriber_count(), 1);
    }

    #[test]
    fn test_behavior_args_are_tracked() {
        let delay = Subject::behavior(Value::Int(50));
        let scope = Scope::new(ObjectRef::from_entries([
            ("name", Value::from("Ann")),
            ("delay$", Value::Stream(delay)),
        ]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let recorder = Recorder::default();

        let expr = Expr::behavior(Expr::scope("name"), "debounce", vec![stream_node("delay$")]);
        assert_eq!(expr.evaluate(&ctx, Some(&recorder)).unwrap(), Value::from("Ann"));
        assert_eq!(*recorder.properties.borrow(), vec!["name", "delay$"]);
        assert_eq!(recorder.streams.borrow().len(), 1);
    }

    #[test]
    fn test_strict_member_on_nullish_returns_instance() {
        let scope = Scope::new(ObjectRef::from_entries([("user", Value::Null)]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let value = Expr::member(Expr::scope("user"), "name").evaluate(&ctx, None).unwrap();
        assert_eq!(value, Value::Null);

        let lenient = EvalContext::new(EvalFlags::default(), &scope, &services);
        let value = Expr::member(Expr::scope("user"), "name").evaluate(&lenient, None).unwrap();
        assert_eq!(value, Value::from(""));
    }

    #[test]
    fn test_stream_scope_reads_cached_value() {
        let subject = Subject::behavior(Value::from("Ann"));
        let scope = Scope::new(ObjectRef::from_entries([(
            "name$",
            Value::Stream(subject.clone()),
        )]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let recorder = Recorder::default();

        let value = stream_node("name$").evaluate(&ctx, Some(&recorder)).unwrap();
        assert_eq!(value, Value::from("Ann"));
        assert_eq!(*recorder.properties.borrow(), vec!["name$"]);
        assert_eq!(recorder.streams.borrow().len(), 1);
        assert_eq!(services.registry().len(), 1);
    }

    #[test]
    fn test_stream_scope_unset_value_is_empty() {
        let subject = Subject::new();
        let scope = Scope::new(ObjectRef::from_entries([("name$", Value::Stream(subject))]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let recorder = Recorder::default();

        let value = stream_node("name$").evaluate(&ctx, Some(&recorder)).unwrap();
        assert_eq!(value, Value::from(""));
    }

    #[test]
    fn test_stream_scope_without_tracker_returns_handle() {
        let stream: StreamRef = Subject::behavior(Value::Int(1));
        let scope = Scope::new(ObjectRef::from_entries([(
            "n$",
            Value::Stream(Rc::clone(&stream)),
        )]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);

        let value = stream_node("n$").evaluate(&ctx, None).unwrap();
        assert_eq!(value, Value::Stream(stream));
        assert!(services.registry().is_empty());
    }

    #[test]
    fn test_stream_member_reads_cached_value() {
        let subject = Subject::behavior(Value::Int(7));
        let model = ObjectRef::from_entries([("count$", Value::Stream(subject))]);
        let scope = Scope::new(ObjectRef::from_entries([("model", Value::Object(model))]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::default(), &scope, &services);
        let recorder = Recorder::default();

        let expr = Rc::new(Expr::StreamAccessMember {
            object: Expr::scope("model"),
            name: "count$".to_string(),
        });
        assert_eq!(expr.evaluate(&ctx, Some(&recorder)).unwrap(), Value::Int(7));
        assert_eq!(*recorder.properties.borrow(), vec!["model", "count$"]);
    }

    #[test]
    fn test_template_renders_nullish_as_empty() {
        let scope = Scope::new(ObjectRef::from_entries([("name", Value::Null)]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let expr = Expr::template(vec!["Hi ".into(), "!".into()], vec![Expr::scope("name")]);
        assert_eq!(expr.evaluate(&ctx, None).unwrap(), Value::from("Hi !"));
    }

    #[test]
    fn test_operators() {
        let scope = Scope::new(ObjectRef::from_entries([
            ("a", Value::Int(6)),
            ("b", Value::Int(4)),
        ]));
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let eval = |e: Rc<Expr>| e.evaluate(&ctx, None).unwrap();
        let a_op_b = |op| Expr::binary(op, Expr::scope("a"), Expr::scope("b"));

        assert_eq!(eval(a_op_b(BinaryOp::Add)), Value::Int(10));
        assert_eq!(eval(a_op_b(BinaryOp::Div)), Value::Float(1.5));
        assert_eq!(eval(a_op_b(BinaryOp::Mod)), Value::Int(2));
        assert_eq!(eval(a_op_b(BinaryOp::Gt)), Value::Bool(true));
        assert_eq!(
            eval(Expr::binary(BinaryOp::Add, Expr::string("n="), Expr::scope("a"))),
            Value::from("n=6")
        );
        assert_eq!(
            eval(Expr::binary(BinaryOp::Eq, Expr::string("6"), Expr::scope("a"))),
            Value::Bool(true)
        );
        assert_eq!(
            eval(Expr::binary(BinaryOp::StrictEq, Expr::string("6"), Expr::scope("a"))),
            Value::Bool(false)
        );
        assert_eq!(eval(Expr::binary(BinaryOp::Or, Expr::string(""), int(3))), Value::Int(3));
        assert_eq!(eval(Expr::unary(UnaryOp::Not, Expr::scope("a"))), Value::Bool(false));
        assert_eq!(eval(Expr::unary(UnaryOp::Typeof, Expr::scope("a"))), Value::from("number"));
        assert_eq!(
            eval(Expr::conditional(Expr::scope("missing"), int(1), int(2))),
            Value::Int(2)
        );
        assert_eq!(
            eval(Expr::binary(BinaryOp::In, Expr::string("a"), Expr::this(0))),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_value_converter() {
        let scope = Scope::new(ObjectRef::from_entries([("name", Value::from("ann"))]));
        let services = Services::default();
        services.register_value_converter("upper", |v: Value, _: &[Value]| {
            Value::from(v.to_string().to_uppercase())
        });
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);

        let expr = Expr::converter(Expr::scope("name"), "upper", Vec::new());
        assert_eq!(expr.evaluate(&ctx, None).unwrap(), Value::from("ANN"));

        let missing = Expr::converter(Expr::scope("name"), "nope", Vec::new());
        assert!(matches!(
            missing.evaluate(&ctx, None),
            Err(ExpressionError::UnknownValueConverter { .. })
        ));
    }

    #[test]
    fn test_calls_are_unsupported() {
        let scope = Scope::new(ObjectRef::new());
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);
        let call = Rc::new(Expr::CallScope {
            name: "f".into(),
            args: Vec::new(),
            ancestor: 0,
        });
        assert_eq!(
            call.evaluate(&ctx, None),
            Err(ExpressionError::UnsupportedConstruct {
                kind: crate::ast::ExprKind::CallScope,
                phase: Phase::Evaluation,
            })
        );
    }

    #[test]
    fn test_assign_plain_and_stream() {
        let context = ObjectRef::from_entries([("name", Value::from("Ann"))]);
        let scope = Scope::new(context.clone());
        let services = Services::default();
        let ctx = EvalContext::new(EvalFlags::strict(), &scope, &services);

        Expr::behavior(Expr::scope("name"), "subscribe", Vec::new())
            .assign(&ctx, Value::from("Bea"))
            .unwrap();
        assert_eq!(context.get("name"), Value::from("Bea"));

        let err = stream_node("name").assign(&ctx, Value::from("Cam")).unwrap_err();
        assert!(matches!(err, ExpressionError::NotAssignable { .. }));
        assert_eq!(context.get("name"), Value::from("Bea"));
    }
}
