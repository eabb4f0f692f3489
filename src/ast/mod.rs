//! Expression grammar.
//!
//! A closed sum type over every node kind the host binding language can
//! produce. Children are shared through `Rc` so a rewrite can return
//! untouched subtrees by reference and compare them by identity.
//!
//! The tree serializes as internally tagged JSON (`{"kind": "access_scope", ...}`),
//! which lets compiled expressions be shipped as data.

mod serialization;
mod validation;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

pub use serialization::{from_json, to_json_pretty};
pub use validation::{validate, MAX_EXPRESSION_DEPTH};

/// Literal constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// Runtime value of the literal.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Undefined => Value::Undefined,
            Self::Null => Value::Null,
            Self::Bool(v) => Value::Bool(*v),
            Self::Int(v) => Value::Int(*v),
            Self::Float(v) => Value::Float(*v),
            Self::String(v) => Value::String(v.clone()),
        }
    }
}

/// Prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Negate,
    /// `+`
    Plus,
    /// `typeof`
    Typeof,
}

/// Infix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    In,
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// `$this`, or `$parent` repeated `ancestor` times.
    AccessThis {
        #[serde(default)]
        ancestor: u32,
    },
    /// Bare name resolved through the scope chain.
    AccessScope {
        name: String,
        #[serde(default)]
        ancestor: u32,
        #[serde(default)]
        access_host_scope: bool,
    },
    /// `object.name`
    AccessMember { object: Rc<Expr>, name: String },
    /// `object[key]`
    AccessKeyed { object: Rc<Expr>, key: Rc<Expr> },
    /// `name(args)` on the scope.
    CallScope {
        name: String,
        args: Vec<Rc<Expr>>,
        #[serde(default)]
        ancestor: u32,
    },
    /// `object.name(args)`
    CallMember {
        object: Rc<Expr>,
        name: String,
        args: Vec<Rc<Expr>>,
    },
    /// `func(args)`
    CallFunction { func: Rc<Expr>, args: Vec<Rc<Expr>> },
    Unary {
        operation: UnaryOp,
        expression: Rc<Expr>,
    },
    Binary {
        operation: BinaryOp,
        left: Rc<Expr>,
        right: Rc<Expr>,
    },
    /// `condition ? yes : no`
    Conditional {
        condition: Rc<Expr>,
        yes: Rc<Expr>,
        no: Rc<Expr>,
    },
    /// `target = value`
    Assign { target: Rc<Expr>, value: Rc<Expr> },
    PrimitiveLiteral { value: Literal },
    ArrayLiteral { elements: Vec<Rc<Expr>> },
    ObjectLiteral {
        keys: Vec<String>,
        values: Vec<Rc<Expr>>,
    },
    /// Template literal; `cooked` has one more segment than `expressions`.
    Template {
        cooked: Vec<String>,
        expressions: Vec<Rc<Expr>>,
    },
    TaggedTemplate {
        cooked: Vec<String>,
        func: Rc<Expr>,
        expressions: Vec<Rc<Expr>>,
    },
    /// Attribute or text interpolation (`a ${b} c`).
    Interpolation {
        parts: Vec<String>,
        expressions: Vec<Rc<Expr>>,
    },
    HtmlLiteral { parts: Vec<Rc<Expr>> },
    /// `expression | name:args`
    ValueConverter {
        expression: Rc<Expr>,
        name: String,
        args: Vec<Rc<Expr>>,
    },
    /// `expression & name:args`
    BindingBehavior {
        expression: Rc<Expr>,
        name: String,
        args: Vec<Rc<Expr>>,
    },
    ForOfStatement {
        declaration: Rc<Expr>,
        iterable: Rc<Expr>,
    },
    BindingIdentifier { name: String },
    ArrayBindingPattern { elements: Vec<Rc<Expr>> },
    ObjectBindingPattern {
        keys: Vec<String>,
        values: Vec<Rc<Expr>>,
    },
    /// Scope access whose value is read through the stream registry.
    StreamAccessScope {
        name: String,
        #[serde(default)]
        ancestor: u32,
        #[serde(default)]
        access_host_scope: bool,
    },
    /// Member access whose value is read through the stream registry.
    StreamAccessMember { object: Rc<Expr>, name: String },
    /// Template re-rendered whenever any stream-derived part changes.
    StreamTemplate {
        cooked: Vec<String>,
        expressions: Vec<Rc<Expr>>,
    },
}

/// Payload-free tag of an [`Expr`] variant.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    AccessThis,
    AccessScope,
    AccessMember,
    AccessKeyed,
    CallScope,
    CallMember,
    CallFunction,
    Unary,
    Binary,
    Conditional,
    Assign,
    PrimitiveLiteral,
    ArrayLiteral,
    ObjectLiteral,
    Template,
    TaggedTemplate,
    Interpolation,
    HtmlLiteral,
    ValueConverter,
    BindingBehavior,
    ForOfStatement,
    BindingIdentifier,
    ArrayBindingPattern,
    ObjectBindingPattern,
    StreamAccessScope,
    StreamAccessMember,
    StreamTemplate,
}

impl ExprKind {
    /// True for the node kinds produced by the stream rewrite.
    #[must_use]
    pub const fn is_stream_aware(self) -> bool {
        matches!(
            self,
            Self::StreamAccessScope | Self::StreamAccessMember | Self::StreamTemplate
        )
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Expr {
    /// Tag of this node.
    #[must_use]
    pub const fn kind(&self) -> ExprKind {
        match self {
            Self::AccessThis { .. } => ExprKind::AccessThis,
            Self::AccessScope { .. } => ExprKind::AccessScope,
            Self::AccessMember { .. } => ExprKind::AccessMember,
            Self::AccessKeyed { .. } => ExprKind::AccessKeyed,
            Self::CallScope { .. } => ExprKind::CallScope,
            Self::CallMember { .. } => ExprKind::CallMember,
            Self::CallFunction { .. } => ExprKind::CallFunction,
            Self::Unary { .. } => ExprKind::Unary,
            Self::Binary { .. } => ExprKind::Binary,
            Self::Conditional { .. } => ExprKind::Conditional,
            Self::Assign { .. } => ExprKind::Assign,
            Self::PrimitiveLiteral { .. } => ExprKind::PrimitiveLiteral,
            Self::ArrayLiteral { .. } => ExprKind::ArrayLiteral,
            Self::ObjectLiteral { .. } => ExprKind::ObjectLiteral,
            Self::Template { .. } => ExprKind::Template,
            Self::TaggedTemplate { .. } => ExprKind::TaggedTemplate,
            Self::Interpolation { .. } => ExprKind::Interpolation,
            Self::HtmlLiteral { .. } => ExprKind::HtmlLiteral,
            Self::ValueConverter { .. } => ExprKind::ValueConverter,
            Self::BindingBehavior { .. } => ExprKind::BindingBehavior,
            Self::ForOfStatement { .. } => ExprKind::ForOfStatement,
            Self::BindingIdentifier { .. } => ExprKind::BindingIdentifier,
            Self::ArrayBindingPattern { .. } => ExprKind::ArrayBindingPattern,
            Self::ObjectBindingPattern { .. } => ExprKind::ObjectBindingPattern,
            Self::StreamAccessScope { .. } => ExprKind::StreamAccessScope,
            Self::StreamAccessMember { .. } => ExprKind::StreamAccessMember,
            Self::StreamTemplate { .. } => ExprKind::StreamTemplate,
        }
    }

    /// True if this node or any descendant reads through a stream.
    #[must_use]
    pub fn is_stream_aware(&self) -> bool {
        self.kind().is_stream_aware() || self.children().into_iter().any(|c| c.is_stream_aware())
    }

    /// Direct sub-expressions in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Rc<Expr>> {
        match self {
            Self::AccessThis { .. }
            | Self::AccessScope { .. }
            | Self::StreamAccessScope { .. }
            | Self::PrimitiveLiteral { .. }
            | Self::BindingIdentifier { .. } => Vec::new(),
            Self::AccessMember { object, .. }
            | Self::StreamAccessMember { object, .. } => vec![object],
            Self::AccessKeyed { object, key } => vec![object, key],
            Self::CallScope { args, .. } => args.iter().collect(),
            Self::CallMember { object, args, .. } => std::iter::once(object).chain(args).collect(),
            Self::CallFunction { func, args } => std::iter::once(func).chain(args).collect(),
            Self::Unary { expression, .. } => vec![expression],
            Self::Binary { left, right, .. } => vec![left, right],
            Self::Conditional { condition, yes, no } => vec![condition, yes, no],
            Self::Assign { target, value } => vec![target, value],
            Self::ArrayLiteral { elements } | Self::ArrayBindingPattern { elements } => {
                elements.iter().collect()
            }
            Self::ObjectLiteral { values, .. } | Self::ObjectBindingPattern { values, .. } => {
                values.iter().collect()
            }
            Self::Template { expressions, .. }
            | Self::StreamTemplate { expressions, .. }
            | Self::Interpolation { expressions, .. } => expressions.iter().collect(),
            Self::TaggedTemplate {
                func, expressions, ..
            } => std::iter::once(func).chain(expressions).collect(),
            Self::HtmlLiteral { parts } => parts.iter().collect(),
            Self::ValueConverter {
                expression, args, ..
            }
            | Self::BindingBehavior {
                expression, args, ..
            } => std::iter::once(expression).chain(args).collect(),
            Self::ForOfStatement {
                declaration,
                iterable,
            } => vec![declaration, iterable],
        }
    }

    /// `name`
    #[must_use]
    pub fn scope(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::AccessScope {
            name: name.into(),
            ancestor: 0,
            access_host_scope: false,
        })
    }

    /// `$parent.…name`, `ancestor` levels up.
    #[must_use]
    pub fn scope_at(name: impl Into<String>, ancestor: u32) -> Rc<Self> {
        Rc::new(Self::AccessScope {
            name: name.into(),
            ancestor,
            access_host_scope: false,
        })
    }

    /// `object.name`
    #[must_use]
    pub fn member(object: Rc<Self>, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::AccessMember {
            object,
            name: name.into(),
        })
    }

    /// `object[key]`
    #[must_use]
    pub fn keyed(object: Rc<Self>, key: Rc<Self>) -> Rc<Self> {
        Rc::new(Self::AccessKeyed { object, key })
    }

    /// `$this` / `$parent`
    #[must_use]
    pub fn this(ancestor: u32) -> Rc<Self> {
        Rc::new(Self::AccessThis { ancestor })
    }

    #[must_use]
    pub fn literal(value: Literal) -> Rc<Self> {
        Rc::new(Self::PrimitiveLiteral { value })
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Rc<Self> {
        Self::literal(Literal::String(value.into()))
    }

    /// Template literal from its cooked segments and interpolated parts.
    #[must_use]
    pub fn template(cooked: Vec<String>, expressions: Vec<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self::Template {
            cooked,
            expressions,
        })
    }

    #[must_use]
    pub fn unary(operation: UnaryOp, expression: Rc<Self>) -> Rc<Self> {
        Rc::new(Self::Unary {
            operation,
            expression,
        })
    }

    #[must_use]
    pub fn binary(operation: BinaryOp, left: Rc<Self>, right: Rc<Self>) -> Rc<Self> {
        Rc::new(Self::Binary {
            operation,
            left,
            right,
        })
    }

    #[must_use]
    pub fn conditional(condition: Rc<Self>, yes: Rc<Self>, no: Rc<Self>) -> Rc<Self> {
        Rc::new(Self::Conditional { condition, yes, no })
    }

    /// `expression | name:args`
    #[must_use]
    pub fn converter(
        expression: Rc<Self>,
        name: impl Into<String>,
        args: Vec<Rc<Self>>,
    ) -> Rc<Self> {
        Rc::new(Self::ValueConverter {
            expression,
            name: name.into(),
            args,
        })
    }

    /// `expression & name:args`
    #[must_use]
    pub fn behavior(
        expression: Rc<Self>,
        name: impl Into<String>,
        args: Vec<Rc<Self>>,
    ) -> Rc<Self> {
        Rc::new(Self::BindingBehavior {
            expression,
            name: name.into(),
            args,
        })
    }
}
