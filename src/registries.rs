//! The engine's registry set.
//!
//! Four registries back the pipeline: trigger factories and handler
//! factories (option-parameterised constructors), plus prototype trigger
//! instances and the handler singletons for introspection and dispatch.
//! They are constructed once at start-up and passed through the run
//! context; there are no process-wide singletons.

use std::sync::Arc;

use crate::error::DodotError;
use crate::handlers::{self, Handler, HandlerFactory};
use crate::registry::Registry;
use crate::triggers::{
    self, CatchAllTrigger, DirectoryTrigger, ExtensionTrigger, FileNameTrigger,
    PathPatternTrigger, Trigger, TriggerFactory,
};

/// All four registries, initialised with the built-in set.
pub struct Registries {
    /// Prototype trigger instances, for listing and kind lookups.
    pub triggers: Registry<dyn Trigger>,
    /// Option-parameterised trigger constructors.
    pub trigger_factories: Registry<TriggerFactory>,
    /// Handler singletons.
    pub handlers: Registry<dyn Handler>,
    /// Option-validating handler constructors.
    pub handler_factories: Registry<HandlerFactory>,
}

impl std::fmt::Debug for Registries {
    // Factories are closures; print the registered names instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("triggers", &self.triggers.list())
            .field("trigger_factories", &self.trigger_factories.list())
            .field("handlers", &self.handlers.list())
            .field("handler_factories", &self.handler_factories.list())
            .finish()
    }
}

/// Build the registries with every built-in trigger and handler.
///
/// Registration happens exactly once here; afterwards the registries are
/// read-only on the hot path.
#[must_use]
pub fn builtin() -> Registries {
    let registries = Registries {
        triggers: Registry::new(),
        trigger_factories: Registry::new(),
        handlers: Registry::new(),
        handler_factories: Registry::new(),
    };
    // Built-in registration cannot collide with itself; a failure here is a
    // programming error surfaced by the debug assertion and tests.
    let populated = populate(&registries);
    debug_assert!(populated.is_ok(), "builtin registration failed");
    registries
}

fn populate(registries: &Registries) -> Result<(), DodotError> {
    triggers::register_builtin_factories(&registries.trigger_factories)?;
    handlers::register_builtin_handlers(&registries.handlers)?;
    handlers::register_builtin_factories(&registries.handler_factories, &registries.handlers)?;
    register_prototype_triggers(&registries.triggers)?;
    Ok(())
}

/// Register neutral prototype instances of each trigger.
fn register_prototype_triggers(registry: &Registry<dyn Trigger>) -> Result<(), DodotError> {
    let prototypes: Vec<(&str, Arc<dyn Trigger>)> = vec![
        ("filename", Arc::new(FileNameTrigger::new("*")?)),
        ("directory", Arc::new(DirectoryTrigger::new("*")?)),
        ("extension", Arc::new(ExtensionTrigger::new("sh")?)),
        ("path_pattern", Arc::new(PathPatternTrigger::new("*")?)),
        ("catchall", Arc::new(CatchAllTrigger::new(&[])?)),
    ];
    for (name, trigger) in prototypes {
        registry.register(name, trigger)?;
    }
    Ok(())
}
