//! Resolver chain
//!
//! When a token is not locally registered, the container consults its
//! registered resolvers in order (typically module-scoped provider
//! maps), then its parent. Resolvers decide for themselves whether a
//! token is visible — this is where module export encapsulation is
//! enforced.

use crate::error::DiResult;
use crate::provider::Provider;
use crate::service::Service;
use crate::token::TokenKey;
use parking_lot::RwLock;
use std::sync::Arc;

/// A fallback resolution source consulted before the parent container.
pub trait TokenResolver: Send + Sync {
    /// Whether this resolver can answer for `key`. Module-scoped
    /// resolvers also check their export lists here.
    fn has_token(&self, key: &TokenKey) -> bool;

    fn resolve_token(
        &self,
        key: &TokenKey,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>>;
}

/// Ordered list of resolvers owned by one container.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: RwLock<Vec<Arc<dyn TokenResolver>>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, resolver: Arc<dyn TokenResolver>) {
        self.resolvers.write().push(resolver);
    }

    pub fn has(&self, key: &TokenKey) -> bool {
        self.resolvers.read().iter().any(|r| r.has_token(key))
    }

    /// First resolver claiming the token answers.
    pub fn resolve(
        &self,
        key: &TokenKey,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        let resolvers = self.resolvers.read().clone();
        for resolver in resolvers {
            if resolver.has_token(key) {
                return resolver.resolve_token(key, providers);
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.read().is_empty()
    }
}
