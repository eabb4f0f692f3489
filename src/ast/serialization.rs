//! Expression serialization helpers.
//!
//! Serde already provides the JSON mapping; these helpers pin the format
//! and make sure decoded trees are validated before use.

use std::rc::Rc;

use crate::ast::{validate, Expr};
use crate::error::{BindError, BindResult, ValidationError};

/// Serialize an expression to pretty JSON.
///
/// # Errors
///
/// Returns [`BindError::Internal`] if serialization fails.
pub fn to_json_pretty(expr: &Expr) -> BindResult<String> {
    serde_json::to_string_pretty(expr)
        .map_err(|e| BindError::internal(format!("serialize expression: {e}")))
}

/// Deserialize and validate an expression from JSON.
///
/// # Errors
///
/// Returns [`BindError::Validation`] for malformed JSON
/// ([`ValidationError::Malformed`]) and for structurally invalid trees.
pub fn from_json(s: &str) -> BindResult<Rc<Expr>> {
    let expr = serde_json::from_str::<Expr>(s).map_err(|e| ValidationError::Malformed {
        message: e.to_string(),
    })?;
    validate(&expr)?;
    Ok(Rc::new(expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal};

    #[test]
    fn json_roundtrip_works() {
        let expr = Expr::behavior(
            Expr::template(
                vec!["Hi ".into(), "!".into()],
                vec![Expr::binary(
                    BinaryOp::Add,
                    Expr::member(Expr::scope("user$"), "name"),
                    Expr::literal(Literal::Int(1)),
                )],
            ),
            "subscribe",
            Vec::new(),
        );

        let json = to_json_pretty(&expr).unwrap();
        let decoded = from_json(&json).unwrap();
        assert_eq!(*expr, *decoded);
    }

    #[test]
    fn accepts_hand_written_json() {
        let json = r#"{
            "kind": "access_member",
            "object": {"kind": "access_scope", "name": "user$"},
            "name": "name"
        }"#;
        let expr = from_json(json).unwrap();
        assert_eq!(*expr, *Expr::member(Expr::scope("user$"), "name"));
    }

    #[test]
    fn rejects_invalid_tree() {
        let err = from_json(r#"{"kind": "access_scope", "name": ""}"#).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = from_json(r#"{"kind": "no_such_node"}"#).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            err,
            BindError::Validation(ValidationError::Malformed { .. })
        ));

        let err = from_json("{not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn deep_json_tree_is_too_deep() {
        let mut json = r#"{"kind": "access_scope", "name": "root"}"#.to_string();
        for _ in 0..crate::ast::MAX_EXPRESSION_DEPTH {
            json = format!(r#"{{"kind": "access_member", "object": {json}, "name": "next"}}"#);
        }
        let err = from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            BindError::Validation(ValidationError::TooDeep { .. })
        ));
    }
}
