//! The binding system: one configured set of collaborators with an explicit
//! lifetime.

use std::rc::Rc;

use tracing::debug;

use crate::ast::Expr;
use crate::binding::{
    AttrSyntax, OneWayCommand, SubscribeBinding, SubscribeCommand, SubscribeInstruction,
    SubscribeRenderer, ONE_WAY_COMMANDS, SUBSCRIBE_COMMAND,
};
use crate::config::BindingSystemConfig;
use crate::error::{BindResult, CompileError};
use crate::eval::{Services, ValueConverter};
use crate::object::ObjectRef;
use crate::rewrite::StreamRebaser;
use crate::stream::StreamRegistry;

/// Owns the stream registry, services and command set for one lifetime.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use streambind::{BindingSystem, Expr, ObjectRef, Scope, Value};
/// use streambind::stream::Subject;
///
/// let system = BindingSystem::default();
/// let name = Subject::behavior(Value::from("Ann"));
/// let model = ObjectRef::from_entries([("name$", Value::Stream(name.clone()))]);
/// let target = ObjectRef::new();
///
/// let binding = system
///     .create_binding("textcontent.subscribe", &Expr::scope("name$"), target.clone())
///     .unwrap();
/// binding.bind(Rc::new(Scope::new(model)), None).unwrap();
/// assert_eq!(target.get("textContent"), Value::from("Ann"));
///
/// name.next(Value::from("Bea"));
/// assert_eq!(target.get("textContent"), Value::from("Bea"));
/// ```
#[derive(Debug)]
pub struct BindingSystem {
    config: BindingSystemConfig,
    rebaser: StreamRebaser,
    services: Rc<Services>,
    renderer: SubscribeRenderer,
}

impl BindingSystem {
    /// Build a system from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Config`](crate::BindError::Config) if the config is invalid.
    pub fn new(config: BindingSystemConfig) -> BindResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config))
    }

    fn assemble(config: BindingSystemConfig) -> Self {
        let registry = Rc::new(StreamRegistry::new(config.registry.clone()));
        let services = Rc::new(Services::new(registry));
        Self {
            rebaser: StreamRebaser::new(config.stream_marker),
            renderer: SubscribeRenderer::new(
                Rc::clone(&services),
                config.observe_leaf_properties_only,
            ),
            config,
            services,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &BindingSystemConfig {
        &self.config
    }

    #[must_use]
    pub const fn rebaser(&self) -> &StreamRebaser {
        &self.rebaser
    }

    #[must_use]
    pub const fn services(&self) -> &Rc<Services> {
        &self.services
    }

    #[must_use]
    pub fn registry(&self) -> &Rc<StreamRegistry> {
        self.services.registry()
    }

    pub fn register_value_converter(
        &self,
        name: impl Into<String>,
        converter: impl ValueConverter + 'static,
    ) {
        self.services.register_value_converter(name, converter);
    }

    /// Rebase with this system's marker.
    ///
    /// # Errors
    ///
    /// See [`StreamRebaser::rebase`].
    pub fn rebase(&self, expr: &Rc<Expr>) -> BindResult<Rc<Expr>> {
        Ok(self.rebaser.rebase(expr)?)
    }

    /// Compile an attribute and its parsed expression into an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnsupportedCommand`] for unknown or missing
    /// commands, and propagates rebase failures.
    pub fn compile(&self, attr: &AttrSyntax, expr: &Rc<Expr>) -> BindResult<SubscribeInstruction> {
        let command = attr.command.as_deref().unwrap_or_default();
        if command == SUBSCRIBE_COMMAND {
            SubscribeCommand::new(self.rebaser).build(attr, expr)
        } else if ONE_WAY_COMMANDS.contains(&command) {
            OneWayCommand::new(self.rebaser).build(attr, expr)
        } else {
            Err(CompileError::UnsupportedCommand {
                command: command.to_string(),
            }
            .into())
        }
    }

    /// Create the binding for an instruction on `target`.
    #[must_use]
    pub fn render(
        &self,
        instruction: &SubscribeInstruction,
        target: ObjectRef,
    ) -> Rc<SubscribeBinding> {
        self.renderer.render(instruction, target)
    }

    /// Parse, compile and render in one step.
    ///
    /// # Errors
    ///
    /// Propagates attribute, command and rebase failures.
    pub fn create_binding(
        &self,
        raw_name: &str,
        expr: &Rc<Expr>,
        target: ObjectRef,
    ) -> BindResult<Rc<SubscribeBinding>> {
        let attr = AttrSyntax::parse(raw_name, "")?;
        let instruction = self.compile(&attr, expr)?;
        Ok(self.render(&instruction, target))
    }

    /// Destroy every live stream observer and empty the registry.
    ///
    /// Bindings still bound keep their last value but receive no further
    /// stream updates.
    pub fn shutdown(&self) {
        let live = self.registry().len();
        self.registry().clear();
        debug!(observers = live, "binding system shut down");
    }
}

impl Default for BindingSystem {
    fn default() -> Self {
        Self::assemble(BindingSystemConfig::default())
    }
}
