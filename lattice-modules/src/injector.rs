//! Module injector chain
//!
//! An ordered list of injectors classifies the candidate types of a
//! loading module: each injector consumes the subset it validates and
//! passes the remainder to the next. First match wins; whatever no
//! injector claims is left unregistered and reported back.

use crate::Result;
use lattice_ioc::{decorators, Container, Token, TypeKey};
use std::sync::Arc;
use tracing::{debug, trace};

/// Classifies and registers one category of module types.
pub trait ModuleInjector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this injector claims the candidate type.
    fn valid(&self, container: &Container, type_key: &TypeKey) -> bool;

    /// Register the claimed type into the target container.
    fn setup(&self, container: &Container, type_key: &TypeKey) -> Result<()>;
}

/// Registers IoC extension modules first, so their autorun setup runs
/// before ordinary types resolve.
pub struct ExtensionModuleInjector;

impl ModuleInjector for ExtensionModuleInjector {
    fn name(&self) -> &'static str {
        "extension_module"
    }

    fn valid(&self, container: &Container, type_key: &TypeKey) -> bool {
        container
            .registry()
            .has_decorator(type_key.id, decorators::IOC_MODULE)
    }

    fn setup(&self, container: &Container, type_key: &TypeKey) -> Result<()> {
        container.register_token(&Token::Type(*type_key))?;
        Ok(())
    }
}

/// Registers ordinary decorator-annotated injectable types.
pub struct InjectableInjector;

impl ModuleInjector for InjectableInjector {
    fn name(&self) -> &'static str {
        "injectable"
    }

    fn valid(&self, container: &Container, type_key: &TypeKey) -> bool {
        container
            .life_scope()
            .is_valid_dependence(container.registry(), &Token::Type(*type_key))
    }

    fn setup(&self, container: &Container, type_key: &TypeKey) -> Result<()> {
        container.register_token(&Token::Type(*type_key))?;
        Ok(())
    }
}

/// Ordered injector pipeline over a module's candidate type list.
pub struct ModuleInjectorChain {
    injectors: Vec<Arc<dyn ModuleInjector>>,
}

impl ModuleInjectorChain {
    /// The default chain: extension modules, then plain injectables.
    pub fn new() -> Self {
        Self {
            injectors: vec![Arc::new(ExtensionModuleInjector), Arc::new(InjectableInjector)],
        }
    }

    pub fn with_injectors(injectors: Vec<Arc<dyn ModuleInjector>>) -> Self {
        Self { injectors }
    }

    /// Prepend an injector; it sees candidates before the defaults.
    pub fn prepend(&mut self, injector: Arc<dyn ModuleInjector>) {
        self.injectors.insert(0, injector);
    }

    /// Run the chain. Returns the types no injector claimed.
    pub fn inject(&self, container: &Container, types: &[TypeKey]) -> Result<Vec<TypeKey>> {
        let mut remainder: Vec<TypeKey> = types.to_vec();
        for injector in &self.injectors {
            let (claimed, rest): (Vec<TypeKey>, Vec<TypeKey>) = remainder
                .into_iter()
                .partition(|t| injector.valid(container, t));
            for type_key in &claimed {
                trace!(injector = injector.name(), ty = type_key.name, "injecting type");
                injector.setup(container, type_key)?;
            }
            remainder = rest;
        }
        if !remainder.is_empty() {
            debug!(
                unclaimed = remainder.len(),
                "module types not claimed by any injector"
            );
        }
        Ok(remainder)
    }
}

impl Default for ModuleInjectorChain {
    fn default() -> Self {
        Self::new()
    }
}
