//! Lattice module system
//!
//! This crate layers modules on top of the IoC container:
//! - Async module loading through a loader collaborator
//! - Type classification and registration via an injector chain
//! - Export-based encapsulation via module-scoped resolvers
//! - Circular dependency detection over the module graph
//!
//! The container core never performs module resolution itself; a
//! [`ModuleLoader`] supplies pre-extracted [`ModuleSource`]
//! descriptors and this crate wires them in.

pub mod error;
pub mod graph;
pub mod injector;
pub mod loader;
pub mod resolver;

pub use error::{ModuleError, Result};
pub use graph::ModuleGraph;
pub use injector::{ModuleInjector, ModuleInjectorChain};
pub use loader::{ContainerModuleExt, ModuleLoader, StaticModuleLoader};
pub use resolver::ModuleProviderResolver;

use lattice_ioc::{Container, Token, TypeKey};
use std::sync::Arc;

/// Pre-extracted description of one loadable module.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// Unique module name.
    pub name: String,

    /// Candidate types declared by the module, in declaration order.
    pub types: Vec<TypeKey>,

    /// Provider bindings applied inside the module's container.
    pub providers: Vec<(Token, Token)>,

    /// Tokens visible to importers; everything else stays internal.
    pub exports: Vec<Token>,

    /// Names of modules this module imports.
    pub dependencies: Vec<String>,
}

impl ModuleSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            providers: Vec::new(),
            exports: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_key: TypeKey) -> Self {
        self.types.push(type_key);
        self
    }

    pub fn with_provider(mut self, provide: Token, implementation: Token) -> Self {
        self.providers.push((provide, implementation));
        self
    }

    pub fn with_export(mut self, token: Token) -> Self {
        self.exports.push(token);
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Token marking this module as fully loaded; registered once all
    /// of the module's types are injected, gating first access.
    pub fn completion_token(&self) -> Token {
        Token::name(format!("module:{}", self.name))
    }
}

/// A module after loading: its source, its scoped container, and the
/// resolver the importer uses to reach its exports.
pub struct LoadedModule {
    pub source: Arc<ModuleSource>,
    pub container: Container,
    pub resolver: Arc<ModuleProviderResolver>,
}
