//! Binding scopes and name resolution.
//!
//! A scope pairs a binding context (the view-model) with an override
//! context (locals such as repeat items) and links to its parent scope.
//! Scope-relative names resolve against the innermost scope that defines
//! them, then against the host scope chain, and finally fall back to the
//! innermost binding context so unknown names stay observable.

use std::rc::Rc;

use crate::object::ObjectRef;

/// One level of the binding scope chain.
#[derive(Debug, Clone)]
pub struct Scope {
    binding_context: ObjectRef,
    override_context: ObjectRef,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    /// Root scope over a binding context.
    #[must_use]
    pub fn new(binding_context: ObjectRef) -> Self {
        Self {
            binding_context,
            override_context: ObjectRef::new(),
            parent: None,
        }
    }

    /// Child scope whose `$parent` is `parent`.
    #[must_use]
    pub fn from_parent(parent: Rc<Scope>, binding_context: ObjectRef) -> Self {
        Self {
            binding_context,
            override_context: ObjectRef::new(),
            parent: Some(parent),
        }
    }

    /// Replace the override context.
    #[must_use]
    pub fn with_override_context(mut self, override_context: ObjectRef) -> Self {
        self.override_context = override_context;
        self
    }

    #[must_use]
    pub const fn binding_context(&self) -> &ObjectRef {
        &self.binding_context
    }

    #[must_use]
    pub const fn override_context(&self) -> &ObjectRef {
        &self.override_context
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Scope> {
        self.parent.as_deref()
    }

    /// Walk `depth` levels up the chain (`0` is this scope).
    #[must_use]
    pub fn ancestor(&self, depth: u32) -> Option<&Scope> {
        let mut current = self;
        for _ in 0..depth {
            current = current.parent()?;
        }
        Some(current)
    }

    fn defining_context(&self, name: &str) -> Option<&ObjectRef> {
        if self.override_context.has(name) {
            Some(&self.override_context)
        } else if self.binding_context.has(name) {
            Some(&self.binding_context)
        } else {
            None
        }
    }

    fn find_in_chain(&self, name: &str) -> Option<&ObjectRef> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(context) = scope.defining_context(name) {
                return Some(context);
            }
            current = scope.parent();
        }
        None
    }
}

/// Find the object that holds `name`.
///
/// With `ancestor > 0` only that ancestor is consulted (its override
/// context first); `None` means the chain is not that deep. With
/// `ancestor == 0` the scope chain is searched, then `host_scope`'s chain,
/// and the innermost binding context is returned when nothing defines it.
#[must_use]
pub fn resolve(
    scope: &Scope,
    name: &str,
    ancestor: u32,
    host_scope: Option<&Scope>,
) -> Option<ObjectRef> {
    if ancestor > 0 {
        let target = scope.ancestor(ancestor)?;
        return Some(
            target
                .defining_context(name)
                .unwrap_or(&target.binding_context)
                .clone(),
        );
    }

    if let Some(context) = scope.find_in_chain(name) {
        return Some(context.clone());
    }
    if let Some(context) = host_scope.and_then(|host| host.find_in_chain(name)) {
        return Some(context.clone());
    }
    Some(scope.binding_context.clone())
}
