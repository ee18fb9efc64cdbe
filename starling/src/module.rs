use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use starling_api::{Module, ModuleLoader, SpawnError};
use tracing::debug;

use crate::sync::{read, write};

/// In-process module registry.
///
/// Modules are registered once under a unique name and shared by every actor
/// launched from them.
///
/// # Examples
///
/// ```rust
/// use starling::module::ModuleRegistry;
/// use starling_api::{InitError, ModuleLoader, ServiceContext, ServiceInstance};
///
/// struct Logger;
///
/// impl ServiceInstance for Logger {
///     fn init(&mut self, _ctx: &dyn ServiceContext, _args: &str) -> Result<(), InitError> {
///         Ok(())
///     }
/// }
///
/// let registry = ModuleRegistry::new();
/// registry
///     .register("logger", || Box::new(Logger) as Box<dyn ServiceInstance>)
///     .unwrap();
/// assert!(registry.query("logger").is_some());
/// assert!(registry.register("logger", || Box::new(Logger) as Box<dyn ServiceInstance>).is_err());
/// ```
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, Arc<dyn Module>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `module` under `name`. Fails if the name is taken.
    pub fn register<M>(&self, name: &str, module: M) -> Result<(), SpawnError>
    where
        M: Module + 'static,
    {
        let mut modules = write(&self.modules);
        if modules.contains_key(name) {
            return Err(SpawnError::ModuleExists(name.to_string()));
        }
        modules.insert(name.to_string(), Arc::new(module));
        debug!(module = name, "module registered");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        read(&self.modules).contains_key(name)
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.modules).keys().cloned().collect();
        names.sort();
        names
    }
}

impl ModuleLoader for ModuleRegistry {
    fn query(&self, name: &str) -> Option<Arc<dyn Module>> {
        read(&self.modules).get(name).cloned()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
