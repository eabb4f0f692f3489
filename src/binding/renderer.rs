//! Turns render instructions into live bindings.

use std::rc::Rc;

use crate::binding::command::{camel_case, map_attribute, SubscribeInstruction};
use crate::binding::subscribe::SubscribeBinding;
use crate::eval::{EvalFlags, Services};
use crate::object::ObjectRef;

/// Renderer for [`SubscribeInstruction`]s.
#[derive(Debug, Clone)]
pub struct SubscribeRenderer {
    services: Rc<Services>,
    observe_leaf_properties_only: bool,
}

impl SubscribeRenderer {
    #[must_use]
    pub const fn new(services: Rc<Services>, observe_leaf_properties_only: bool) -> Self {
        Self {
            services,
            observe_leaf_properties_only,
        }
    }

    /// Property name an instruction's `to` maps onto.
    #[must_use]
    pub fn target_property(to: &str) -> String {
        map_attribute(to).map_or_else(|| camel_case(to), str::to_string)
    }

    /// Create the (unbound) binding for `instruction` on `target`.
    #[must_use]
    pub fn render(
        &self,
        instruction: &SubscribeInstruction,
        target: ObjectRef,
    ) -> Rc<SubscribeBinding> {
        let flags = EvalFlags {
            strict: instruction.strict,
            observe_leaf_properties_only: self.observe_leaf_properties_only,
        };
        SubscribeBinding::new(
            Rc::clone(&instruction.from),
            target,
            Self::target_property(&instruction.to),
            Rc::clone(&self.services),
            flags,
        )
    }
}
