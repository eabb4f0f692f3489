//! Binding front end and adapter.
//!
//! - [`command`] splits template attributes and compiles them into
//!   [`SubscribeInstruction`]s.
//! - [`behavior`] implements the `& subscribe` opt-in for one-way bindings.
//! - [`renderer`] turns instructions into [`SubscribeBinding`]s.
//! - [`subscribe`] is the binding adapter itself.

/// `& subscribe` binding behavior.
pub mod behavior;
/// Attribute syntax and binding commands.
pub mod command;
/// Instruction renderer.
pub mod renderer;
/// The subscribe binding adapter.
pub mod subscribe;

pub use behavior::{apply_subscribe_behavior, has_subscribe_behavior, SUBSCRIBE_BEHAVIOR};
pub use command::{
    camel_case, map_attribute, AttrSyntax, OneWayCommand, SubscribeCommand, SubscribeInstruction,
    ONE_WAY_COMMANDS, SUBSCRIBE_COMMAND,
};
pub use renderer::SubscribeRenderer;
pub use subscribe::{BindingId, SubscribeBinding};
