//! Module-scoped resolution
//!
//! Importers never reach into a module's container directly; they go
//! through a [`ModuleProviderResolver`] registered into their resolver
//! chain. The resolver answers only for tokens the module declared in
//! its `exports` or `providers` lists — internal registrations stay
//! invisible.

use crate::ModuleSource;
use lattice_ioc::{Container, DiResult, Provider, Service, TokenKey, TokenResolver};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::trace;

pub struct ModuleProviderResolver {
    source: Arc<ModuleSource>,
    container: Container,
    visible: FxHashSet<TokenKey>,
}

impl ModuleProviderResolver {
    pub fn new(source: Arc<ModuleSource>, container: Container) -> Self {
        let mut visible: FxHashSet<TokenKey> =
            source.exports.iter().map(|t| t.key()).collect();
        for (provide, _) in &source.providers {
            visible.insert(provide.key());
        }
        visible.insert(source.completion_token().key());
        Self {
            source,
            container,
            visible,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.source.name
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Whether the module declared this token as visible.
    pub fn exports_token(&self, key: &TokenKey) -> bool {
        self.visible.contains(key)
    }
}

impl TokenResolver for ModuleProviderResolver {
    fn has_token(&self, key: &TokenKey) -> bool {
        self.exports_token(key) && self.container.has_register(key)
    }

    fn resolve_token(
        &self,
        key: &TokenKey,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        if !self.exports_token(key) {
            trace!(module = %self.source.name, %key, "token not exported");
            return Ok(None);
        }
        self.container.resolve_key(key, providers)
    }
}
