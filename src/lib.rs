//! # streambind - Stream-aware data binding expressions
//!
//! streambind lets a data-binding expression read asynchronous streams as if
//! they were plain properties. Any property whose name ends in the stream
//! marker (`$` by default) is treated as a stream: the binding shows the
//! stream's latest value and updates whenever the stream emits.
//!
//! ## Core Concepts
//!
//! - **Expr**: the closed expression grammar a binding evaluates
//! - **Rebase**: a one-time rewrite swapping marked accesses for stream-aware nodes
//! - **StreamObserver**: one subscription and one cached value per stream, shared by all bindings
//! - **SubscribeBinding**: keeps one target property in sync with one expression
//!
//! ## Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use streambind::{BindingSystem, Expr, ObjectRef, Scope, Value};
//! use streambind::stream::Subject;
//!
//! let system = BindingSystem::default();
//!
//! // `user$` holds a stream of user objects
//! let ann = ObjectRef::from_entries([("name", Value::from("Ann"))]);
//! let user = Subject::behavior(Value::Object(ann));
//! let model = ObjectRef::from_entries([("user$", Value::Stream(user.clone()))]);
//!
//! // <span textcontent.subscribe="user$.name">
//! let target = ObjectRef::new();
//! let binding = system.create_binding(
//!     "textcontent.subscribe",
//!     &Expr::member(Expr::scope("user$"), "name"),
//!     target.clone(),
//! )?;
//! binding.bind(Rc::new(Scope::new(model)), None)?;
//! assert_eq!(target.get("textContent"), Value::from("Ann"));
//!
//! user.next(Value::Object(ObjectRef::from_entries([("name", Value::from("Bea"))])));
//! assert_eq!(target.get("textContent"), Value::from("Bea"));
//! # Ok::<(), streambind::BindError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Values and the change-tracking substrate
pub mod error;
pub mod object;
pub mod observation;
pub mod scope;
pub mod value;

// Expressions
pub mod ast;
pub mod eval;
pub mod rewrite;

// Streams and bindings
pub mod binding;
pub mod config;
pub mod stream;
pub mod system;

// Re-export primary types at crate root for convenience
pub use ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
pub use binding::{AttrSyntax, BindingId, SubscribeBinding, SubscribeInstruction, SubscribeRenderer};
pub use config::{BindingSystemConfig, RegistryConfig};
pub use error::{BindError, BindResult, CompileError, ExpressionError, Phase, ValidationError};
pub use eval::{EvalContext, EvalFlags, Services, ValueConverter};
pub use object::ObjectRef;
pub use observation::{
    ChangeTracker, ObservationRecord, Subscriber, SubscriberCollection, SubscriberId,
};
pub use rewrite::{rebase, StreamRebaser};
pub use scope::Scope;
pub use stream::{
    Stream, StreamEvent, StreamObserver, StreamRef, StreamRegistry, StreamSubscription,
};
pub use system::BindingSystem;
pub use value::Value;
