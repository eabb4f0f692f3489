//! Structural validation of expression trees received as data.
//!
//! Trees built in code are well formed by construction; trees decoded from
//! JSON are not, so `from_json` runs these checks before handing a tree out.

use crate::ast::Expr;
use crate::error::ValidationError;

/// Upper bound on expression nesting.
///
/// A node costs at most two JSON nesting levels (object plus child array),
/// so this stays under `serde_json`'s recursion limit of 128 and deep trees
/// decoded by `from_json` fail here with `TooDeep`.
pub const MAX_EXPRESSION_DEPTH: usize = 60;

fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_segments(segments: usize, expressions: usize) -> Result<(), ValidationError> {
    if segments != expressions + 1 {
        return Err(ValidationError::TemplateArity {
            cooked: segments,
            expressions,
        });
    }
    Ok(())
}

fn validate_pairs(field: &'static str, keys: usize, values: usize) -> Result<(), ValidationError> {
    if keys != values {
        return Err(ValidationError::ArityMismatch {
            field: field.to_string(),
            expected: keys,
            actual: values,
        });
    }
    Ok(())
}

fn validate_node(expr: &Expr) -> Result<(), ValidationError> {
    match expr {
        Expr::AccessScope { name, .. } | Expr::StreamAccessScope { name, .. } => {
            validate_name("name", name)
        }
        Expr::AccessMember { name, .. }
        | Expr::StreamAccessMember { name, .. }
        | Expr::CallScope { name, .. }
        | Expr::CallMember { name, .. }
        | Expr::BindingIdentifier { name } => validate_name("name", name),
        Expr::ValueConverter { name, .. } | Expr::BindingBehavior { name, .. } => {
            validate_name("name", name)
        }
        Expr::Template {
            cooked, expressions, ..
        }
        | Expr::StreamTemplate {
            cooked, expressions, ..
        }
        | Expr::TaggedTemplate {
            cooked, expressions, ..
        } => validate_segments(cooked.len(), expressions.len()),
        Expr::Interpolation { parts, expressions } => {
            validate_segments(parts.len(), expressions.len())
        }
        Expr::ObjectLiteral { keys, values } | Expr::ObjectBindingPattern { keys, values } => {
            validate_pairs("values", keys.len(), values.len())
        }
        _ => Ok(()),
    }
}

/// Validate a whole tree.
///
/// Walks iteratively so adversarial nesting cannot overflow the stack.
///
/// # Errors
///
/// Returns the first structural problem found, in pre-order.
pub fn validate(root: &Expr) -> Result<(), ValidationError> {
    let mut stack: Vec<(&Expr, usize)> = vec![(root, 1)];
    while let Some((expr, depth)) = stack.pop() {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(ValidationError::TooDeep {
                max_depth: MAX_EXPRESSION_DEPTH,
            });
        }
        validate_node(expr)?;
        stack.extend(expr.children().into_iter().rev().map(|c| (&**c, depth + 1)));
    }
    Ok(())
}
