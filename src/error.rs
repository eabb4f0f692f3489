//! Error types for streambind.
//!
//! All errors in streambind are strongly typed using thiserror.
//! Every failure here is a programmer-error-class condition raised
//! synchronously at the point of misuse; nothing is retried internally.

use std::fmt;

use thiserror::Error;

use crate::ast::ExprKind;

/// Processing phase in which an expression error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The stream rewrite pass.
    Rewrite,
    /// Expression evaluation.
    Evaluation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rewrite => f.write_str("stream rewrite"),
            Self::Evaluation => f.write_str("evaluation"),
        }
    }
}

/// Errors raised while rewriting, evaluating or assigning through an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("{kind} expression is not supported during {phase}")]
    UnsupportedConstruct {
        kind: ExprKind,
        phase: Phase,
    },

    #[error("{kind} expression is not assignable")]
    NotAssignable {
        kind: ExprKind,
    },

    #[error("Stream is read-only")]
    ReadOnlyStream,

    #[error("Value converter '{name}' is not registered")]
    UnknownValueConverter {
        name: String,
    },
}

/// Structural validation errors for expression trees received as data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Template has {cooked} literal segments for {expressions} expressions")]
    TemplateArity {
        cooked: usize,
        expressions: usize,
    },

    #[error("Field '{field}' has {actual} entries, expected {expected}")]
    ArityMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expression nesting exceeds maximum depth of {max_depth}")]
    TooDeep {
        max_depth: usize,
    },

    #[error("Malformed expression JSON: {message}")]
    Malformed {
        message: String,
    },
}

/// Errors raised by the attribute/command front end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Binding command '{command}' is not supported")]
    UnsupportedCommand {
        command: String,
    },

    #[error("Attribute '{raw_name}' does not carry a binding command")]
    InvalidAttribute {
        raw_name: String,
    },
}

/// Top-level error type for streambind.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Binding to '{property}' is not bound")]
    NotBound {
        property: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BindError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is an expression error.
    #[must_use]
    pub const fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a compile error.
    #[must_use]
    pub const fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }

    /// Returns true if the error reports an unsupported construct.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Expression(ExpressionError::UnsupportedConstruct { .. }))
    }

    /// Returns true if the error reports a write through a read-only expression.
    #[must_use]
    pub const fn is_not_assignable(&self) -> bool {
        matches!(self, Self::Expression(ExpressionError::NotAssignable { .. }))
    }

    /// Returns true if the error reports a write into the stream registry.
    #[must_use]
    pub const fn is_read_only_stream(&self) -> bool {
        matches!(self, Self::Expression(ExpressionError::ReadOnlyStream))
    }

    /// Returns true for misuse of the expression contract.
    ///
    /// These are surfaced immediately and never retried.
    #[must_use]
    pub const fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::Expression(
                ExpressionError::UnsupportedConstruct { .. }
                    | ExpressionError::NotAssignable { .. }
                    | ExpressionError::ReadOnlyStream
            )
        )
    }

    /// Returns true if this error is retryable. No streambind error is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for streambind operations.
pub type BindResult<T> = Result<T, BindError>;
