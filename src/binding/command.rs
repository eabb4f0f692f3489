//! Attribute syntax and binding commands.
//!
//! An attribute such as `value.subscribe="user$.name"` is split into a
//! target (`value`) and a command (`subscribe`). The command decides how
//! the already-parsed expression is compiled into a render instruction.

use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::Expr;
use crate::binding::behavior::apply_subscribe_behavior;
use crate::error::{BindError, BindResult, CompileError};
use crate::rewrite::StreamRebaser;

/// Command name handled by [`SubscribeCommand`].
pub const SUBSCRIBE_COMMAND: &str = "subscribe";

/// One-way commands that honour a trailing `& subscribe` behavior.
pub const ONE_WAY_COMMANDS: [&str; 3] = ["bind", "to-view", "one-way"];

static ATTR_PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn attr_pattern() -> BindResult<&'static Regex> {
    ATTR_PATTERN
        .get_or_init(|| Regex::new(r"^(?P<target>[^.\s]+)\.(?P<command>[^.\s]+)$"))
        .as_ref()
        .map_err(|e| BindError::internal(format!("attribute pattern: {e}")))
}

/// A template attribute split into target and command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrSyntax {
    pub raw_name: String,
    pub raw_value: String,
    pub target: String,
    pub command: Option<String>,
}

impl AttrSyntax {
    /// Split `PART.command`; a name without a command keeps `command` empty.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidAttribute`] for an empty or malformed
    /// name such as `a.b.c`.
    pub fn parse(raw_name: &str, raw_value: &str) -> BindResult<Self> {
        let name = raw_name.trim();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(CompileError::InvalidAttribute {
                raw_name: raw_name.to_string(),
            }
            .into());
        }

        let (target, command) = match attr_pattern()?.captures(name) {
            Some(caps) => (caps["target"].to_string(), Some(caps["command"].to_string())),
            None if !name.contains('.') => (name.to_string(), None),
            None => {
                return Err(CompileError::InvalidAttribute {
                    raw_name: raw_name.to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            raw_name: raw_name.to_string(),
            raw_value: raw_value.to_string(),
            target,
            command,
        })
    }
}

/// Render instruction produced by the binding commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeInstruction {
    /// Expression to evaluate, rebased when stream-aware.
    pub from: Rc<Expr>,
    /// Target property as written in the template.
    pub to: String,
    /// Evaluate with strict nullish semantics.
    pub strict: bool,
}

impl SubscribeInstruction {
    /// Instruction type tag.
    pub const TYPE: &'static str = "si";
}

/// `PART.subscribe`: always rebases, always strict.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeCommand {
    rebaser: StreamRebaser,
}

impl SubscribeCommand {
    #[must_use]
    pub const fn new(rebaser: StreamRebaser) -> Self {
        Self { rebaser }
    }

    /// Rebase `expr` and target `attr.target`.
    ///
    /// # Errors
    ///
    /// Propagates rebase failures.
    pub fn build(&self, attr: &AttrSyntax, expr: &Rc<Expr>) -> BindResult<SubscribeInstruction> {
        Ok(SubscribeInstruction {
            from: self.rebaser.rebase(expr)?,
            to: attr.target.clone(),
            strict: true,
        })
    }
}

/// `PART.bind` / `PART.to-view` / `PART.one-way`.
///
/// With a trailing `& subscribe` the expression is rebased and evaluated
/// strictly; otherwise it is used as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneWayCommand {
    rebaser: StreamRebaser,
}

impl OneWayCommand {
    #[must_use]
    pub const fn new(rebaser: StreamRebaser) -> Self {
        Self { rebaser }
    }

    /// # Errors
    ///
    /// Propagates rebase failures of a `& subscribe` expression.
    pub fn build(&self, attr: &AttrSyntax, expr: &Rc<Expr>) -> BindResult<SubscribeInstruction> {
        let instruction = match apply_subscribe_behavior(&self.rebaser, expr)? {
            Some(rebased) => SubscribeInstruction {
                from: rebased,
                to: attr.target.clone(),
                strict: true,
            },
            None => SubscribeInstruction {
                from: Rc::clone(expr),
                to: attr.target.clone(),
                strict: false,
            },
        };
        Ok(instruction)
    }
}

/// Map an attribute name onto the property it drives.
#[must_use]
pub fn map_attribute(attribute: &str) -> Option<&'static str> {
    Some(match attribute {
        "class" => "className",
        "for" => "htmlFor",
        "textcontent" => "textContent",
        "innerhtml" => "innerHTML",
        "readonly" => "readOnly",
        "tabindex" => "tabIndex",
        "maxlength" => "maxLength",
        "minlength" => "minLength",
        "colspan" => "colSpan",
        "rowspan" => "rowSpan",
        "contenteditable" => "contentEditable",
        "scrolltop" => "scrollTop",
        "scrollleft" => "scrollLeft",
        _ => return None,
    })
}

/// `kebab-case` / `snake_case` to `camelCase`.
#[must_use]
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = false;
    for ch in input.chars() {
        if ch == '-' || ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    #[test]
    fn test_parse_part_command() {
        let attr = AttrSyntax::parse("value.subscribe", "user$.name").unwrap();
        assert_eq!(attr.target, "value");
        assert_eq!(attr.command.as_deref(), Some("subscribe"));
        assert_eq!(attr.raw_value, "user$.name");
    }

    #[test]
    fn test_parse_plain_attribute() {
        let attr = AttrSyntax::parse("title", "x").unwrap();
        assert_eq!(attr.target, "title");
        assert!(attr.command.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", "a.b.c", ".subscribe", "value."] {
            let err = AttrSyntax::parse(raw, "").unwrap_err();
            assert!(err.is_compile(), "{raw}");
        }
    }

    #[test]
    fn test_subscribe_command_rebases_strictly() {
        let attr = AttrSyntax::parse("textcontent.subscribe", "").unwrap();
        let expr = Expr::member(Expr::scope("user$"), "name");
        let instruction = SubscribeCommand::default().build(&attr, &expr).unwrap();
        assert!(instruction.strict);
        assert_eq!(instruction.to, "textcontent");
        assert!(instruction.from.is_stream_aware());
    }

    #[test]
    fn test_one_way_without_behavior_is_untouched() {
        let attr = AttrSyntax::parse("value.bind", "").unwrap();
        let expr = Expr::member(Expr::scope("user$"), "name");
        let instruction = OneWayCommand::default().build(&attr, &expr).unwrap();
        assert!(!instruction.strict);
        assert!(Rc::ptr_eq(&instruction.from, &expr));
    }

    #[test]
    fn test_one_way_with_behavior_is_rebased() {
        let attr = AttrSyntax::parse("value.bind", "").unwrap();
        let expr = Expr::behavior(Expr::scope("name$"), "subscribe", Vec::new());
        let instruction = OneWayCommand::default().build(&attr, &expr).unwrap();
        assert!(instruction.strict);
        assert_eq!(instruction.from.kind(), ExprKind::BindingBehavior);
        assert!(instruction.from.is_stream_aware());
    }

    #[test]
    fn test_attribute_mapping() {
        assert_eq!(map_attribute("class"), Some("className"));
        assert_eq!(map_attribute("textcontent"), Some("textContent"));
        assert_eq!(map_attribute("value"), None);
        assert_eq!(camel_case("text-content"), "textContent");
        assert_eq!(camel_case("aria_label"), "ariaLabel");
        assert_eq!(camel_case("value"), "value");
    }
}
