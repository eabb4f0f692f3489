//! The `& subscribe` binding behavior.
//!
//! Lets an ordinary one-way binding opt into stream reads without the
//! dedicated `subscribe` command: `value.bind="name$ & subscribe"`.

use std::rc::Rc;

use crate::ast::Expr;
use crate::error::BindResult;
use crate::rewrite::StreamRebaser;

/// Behavior name that enables stream rebasing.
pub const SUBSCRIBE_BEHAVIOR: &str = "subscribe";

/// True if the behavior chain wrapping `expr` includes `& subscribe`.
#[must_use]
pub fn has_subscribe_behavior(expr: &Expr) -> bool {
    let mut current = expr;
    while let Expr::BindingBehavior {
        expression, name, ..
    } = current
    {
        if name == SUBSCRIBE_BEHAVIOR {
            return true;
        }
        current = &**expression;
    }
    false
}

/// Rebase `expr` if it carries `& subscribe`; `None` leaves it as written.
///
/// # Errors
///
/// Propagates rebase failures.
pub fn apply_subscribe_behavior(
    rebaser: &StreamRebaser,
    expr: &Rc<Expr>,
) -> BindResult<Option<Rc<Expr>>> {
    if !has_subscribe_behavior(expr) {
        return Ok(None);
    }
    Ok(Some(rebaser.rebase(expr)?))
}
