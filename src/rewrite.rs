//! Stream rebase pass.
//!
//! Walks an expression tree once and swaps scope and member accesses whose
//! name carries the stream marker for their stream-aware counterparts.
//!
//! # Invariants
//!
//! 1. A subtree with no marked name comes back as the same `Rc` (no allocation).
//! 2. Containers are rebuilt iff at least one child was rebuilt; unchanged
//!    siblings inside a rebuilt container are shared, not copied.
//! 3. The stored name keeps its marker: `user$` still reads the `user$` key.
//! 4. Stream-aware nodes pass through untouched, so rebasing twice is a no-op.
//! 5. Node kinds outside the supported subset fail the whole rebase.

use std::rc::Rc;

use tracing::debug;

use crate::ast::Expr;
use crate::config::DEFAULT_STREAM_MARKER;
use crate::error::{ExpressionError, Phase};

/// Rewrites marked accesses into stream-aware nodes.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use streambind::{Expr, ExprKind, StreamRebaser};
///
/// let rebaser = StreamRebaser::default();
///
/// let plain = Expr::member(Expr::scope("user"), "name");
/// assert!(Rc::ptr_eq(&rebaser.rebase(&plain).unwrap(), &plain));
///
/// let streamed = rebaser.rebase(&Expr::member(Expr::scope("user$"), "name")).unwrap();
/// assert_eq!(streamed.kind(), ExprKind::AccessMember);
/// assert!(streamed.is_stream_aware());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRebaser {
    marker: char,
}

impl StreamRebaser {
    /// Rebaser for properties ending in `marker`.
    #[must_use]
    pub const fn new(marker: char) -> Self {
        Self { marker }
    }

    #[must_use]
    pub const fn marker(&self) -> char {
        self.marker
    }

    /// True if `name` denotes a stream-typed property.
    #[must_use]
    pub fn is_marked(&self, name: &str) -> bool {
        name.ends_with(self.marker)
    }

    /// Rewrite `root`, returning it unchanged if nothing is marked.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UnsupportedConstruct`] if the tree contains
    /// a node kind the rebase does not handle.
    pub fn rebase(&self, root: &Rc<Expr>) -> Result<Rc<Expr>, ExpressionError> {
        let rebased = self.visit(root)?;
        if !Rc::ptr_eq(&rebased, root) {
            debug!(kind = %root.kind(), marker = %self.marker, "rebased expression onto streams");
        }
        Ok(rebased)
    }

    fn visit(&self, expr: &Rc<Expr>) -> Result<Rc<Expr>, ExpressionError> {
        match &**expr {
            Expr::AccessThis { .. }
            | Expr::StreamAccessScope { .. }
            | Expr::StreamAccessMember { .. }
            | Expr::StreamTemplate { .. } => Ok(Rc::clone(expr)),

            Expr::AccessScope {
                name,
                ancestor,
                access_host_scope,
            } => {
                if self.is_marked(name) {
                    Ok(Rc::new(Expr::StreamAccessScope {
                        name: name.clone(),
                        ancestor: *ancestor,
                        access_host_scope: *access_host_scope,
                    }))
                } else {
                    Ok(Rc::clone(expr))
                }
            }

            Expr::AccessMember { object, name } => {
                let rebased = self.visit(object)?;
                if self.is_marked(name) {
                    Ok(Rc::new(Expr::StreamAccessMember {
                        object: rebased,
                        name: name.clone(),
                    }))
                } else if Rc::ptr_eq(&rebased, object) {
                    Ok(Rc::clone(expr))
                } else {
                    Ok(Rc::new(Expr::AccessMember {
                        object: rebased,
                        name: name.clone(),
                    }))
                }
            }

            Expr::BindingBehavior {
                expression,
                name,
                args,
            } => {
                let inner = self.visit(expression)?;
                let rebased_args = self.visit_all(args)?;
                if Rc::ptr_eq(&inner, expression) && rebased_args.is_none() {
                    return Ok(Rc::clone(expr));
                }
                Ok(Rc::new(Expr::BindingBehavior {
                    expression: inner,
                    name: name.clone(),
                    args: rebased_args.unwrap_or_else(|| args.clone()),
                }))
            }

            Expr::Template {
                cooked,
                expressions,
            } => match self.visit_all(expressions)? {
                Some(expressions) => Ok(Rc::new(Expr::StreamTemplate {
                    cooked: cooked.clone(),
                    expressions,
                })),
                None => Ok(Rc::clone(expr)),
            },

            other => Err(ExpressionError::UnsupportedConstruct {
                kind: other.kind(),
                phase: Phase::Rewrite,
            }),
        }
    }

    /// Visit every item; `None` if all came back unchanged.
    fn visit_all(&self, items: &[Rc<Expr>]) -> Result<Option<Vec<Rc<Expr>>>, ExpressionError> {
        let mut rebuilt: Option<Vec<Rc<Expr>>> = None;
        for (i, item) in items.iter().enumerate() {
            let rebased = self.visit(item)?;
            match &mut rebuilt {
                Some(out) => out.push(rebased),
                None if !Rc::ptr_eq(&rebased, item) => {
                    let mut out = Vec::with_capacity(items.len());
                    out.extend(items[..i].iter().cloned());
                    out.push(rebased);
                    rebuilt = Some(out);
                }
                None => {}
            }
        }
        Ok(rebuilt)
    }
}

impl Default for StreamRebaser {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_MARKER)
    }
}

/// Rebase with the default `$` marker.
///
/// # Errors
///
/// See [`StreamRebaser::rebase`].
pub fn rebase(root: &Rc<Expr>) -> Result<Rc<Expr>, ExpressionError> {
    StreamRebaser::default().rebase(root)
}
