//! Module loading
//!
//! Loading is asynchronous end-to-end. A [`ModuleLoader`] collaborator
//! materializes [`ModuleSource`] descriptors; this module drives the
//! transitive closure, orders it dependencies-first, injects each
//! module's types into a scoped child container, and registers a
//! completion marker before any of the module's tokens become
//! reachable — no type from a module can resolve before the whole
//! module finished loading.

use crate::graph::ModuleGraph;
use crate::injector::ModuleInjectorChain;
use crate::resolver::ModuleProviderResolver;
use crate::{LoadedModule, ModuleError, ModuleSource, Result};
use async_trait::async_trait;
use lattice_ioc::{Container, TypeKey};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Loader collaborator: the core never performs module resolution
/// itself.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Materialize the named modules.
    async fn load(&self, specifiers: &[String]) -> Result<Vec<Arc<ModuleSource>>>;

    /// Candidate types per module, in module order.
    fn get_types(&self, modules: &[Arc<ModuleSource>]) -> Vec<Vec<TypeKey>> {
        modules.iter().map(|m| m.types.clone()).collect()
    }
}

/// In-memory loader backed by a programmatic registry of sources.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: RwLock<FxHashMap<String, Arc<ModuleSource>>>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: ModuleSource) -> Result<()> {
        if source.name.is_empty() {
            return Err(ModuleError::InvalidModuleName {
                name: source.name.clone(),
            });
        }
        self.modules
            .write()
            .insert(source.name.clone(), Arc::new(source));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self, specifiers: &[String]) -> Result<Vec<Arc<ModuleSource>>> {
        let modules = self.modules.read();
        specifiers
            .iter()
            .map(|name| {
                modules
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ModuleError::ModuleNotFound { name: name.clone() })
            })
            .collect()
    }
}

/// Load `specifiers` (and their transitive dependencies) into
/// `container`, dependencies first.
pub async fn load_modules(
    container: &Container,
    loader: &dyn ModuleLoader,
    chain: &ModuleInjectorChain,
    specifiers: &[String],
) -> Result<Vec<LoadedModule>> {
    // Gather the transitive closure of sources.
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut sources: Vec<Arc<ModuleSource>> = Vec::new();
    let mut pending: Vec<String> = specifiers.to_vec();
    while !pending.is_empty() {
        let batch = loader.load(&pending).await?;
        pending = Vec::new();
        for source in batch {
            if !seen.insert(source.name.clone()) {
                continue;
            }
            for dep in &source.dependencies {
                if !seen.contains(dep) {
                    pending.push(dep.clone());
                }
            }
            sources.push(source);
        }
    }

    let graph = ModuleGraph::build(&sources);
    let order = graph.topological_sort()?;

    let mut loaded = Vec::new();
    for name in &order {
        let Some(source) = graph.get(name) else {
            continue;
        };
        if container.has(&source.completion_token()) {
            debug!(module = name.as_str(), "module already loaded; skipping");
            continue;
        }
        loaded.push(load_one(container, chain, source.clone())?);
    }
    Ok(loaded)
}

fn load_one(
    container: &Container,
    chain: &ModuleInjectorChain,
    source: Arc<ModuleSource>,
) -> Result<LoadedModule> {
    let module_container = container.create_child();

    chain.inject(&module_container, &source.types)?;
    for (provide, implementation) in &source.providers {
        module_container.bind_provider(provide, implementation)?;
    }

    // A declared export that nothing registered is a broken module.
    for export in &source.exports {
        if !module_container.has(export) {
            return Err(ModuleError::ExportNotFound {
                name: export.to_string(),
                module: source.name.clone(),
            });
        }
    }

    // All types are in; the module is now allowed to be seen.
    module_container.register_value(
        &source.completion_token(),
        Arc::new(source.name.clone()),
    )?;

    let resolver = Arc::new(ModuleProviderResolver::new(
        source.clone(),
        module_container.clone(),
    ));
    container.add_resolver(resolver.clone());

    info!(
        module = %source.name,
        types = source.types.len(),
        exports = source.exports.len(),
        "module loaded"
    );
    Ok(LoadedModule {
        source,
        container: module_container,
        resolver,
    })
}

/// Module-loading surface of the container.
#[async_trait]
pub trait ContainerModuleExt {
    /// Load modules with the default injector chain.
    async fn load_module(
        &self,
        loader: &dyn ModuleLoader,
        specifiers: &[String],
    ) -> Result<Vec<LoadedModule>>;

    /// Load modules through a custom injector chain.
    async fn use_modules(
        &self,
        loader: &dyn ModuleLoader,
        chain: &ModuleInjectorChain,
        specifiers: &[String],
    ) -> Result<Vec<LoadedModule>>;
}

#[async_trait]
impl ContainerModuleExt for Container {
    async fn load_module(
        &self,
        loader: &dyn ModuleLoader,
        specifiers: &[String],
    ) -> Result<Vec<LoadedModule>> {
        self.use_modules(loader, &ModuleInjectorChain::new(), specifiers)
            .await
    }

    async fn use_modules(
        &self,
        loader: &dyn ModuleLoader,
        chain: &ModuleInjectorChain,
        specifiers: &[String],
    ) -> Result<Vec<LoadedModule>> {
        load_modules(self, loader, chain, specifiers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_loader_serves_registered_sources() {
        let loader = StaticModuleLoader::new();
        loader.register(ModuleSource::new("app")).unwrap();

        let sources = loader.load(&["app".to_string()]).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "app");
    }

    #[tokio::test]
    async fn unknown_module_is_an_error() {
        let loader = StaticModuleLoader::new();
        let result = loader.load(&["missing".to_string()]).await;
        assert!(matches!(result, Err(ModuleError::ModuleNotFound { .. })));
    }

    #[test]
    fn empty_name_is_rejected() {
        let loader = StaticModuleLoader::new();
        let result = loader.register(ModuleSource::new(""));
        assert!(matches!(result, Err(ModuleError::InvalidModuleName { .. })));
    }
}
