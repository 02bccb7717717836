//! The container: resolver of record
//!
//! Owns the factory registry, the singleton store, and the provide
//! table. Resolution order: local singletons, local factories (which
//! run the lifecycle pipeline), registered resolvers, then the parent
//! container. Children hold only a weak reference upward; a container
//! lives exactly as long as its owner.

use crate::builder::ContainerBuilder;
use crate::cache::CacheManager;
use crate::chain::{ResolverChain, TokenResolver};
use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::lifescope::LifeScope;
use crate::provider::{Provider, ProviderMap};
use crate::reflect::TypeRegistry;
use crate::service::{downcast_shared, ArgList, Service};
use crate::token::{Token, TokenKey, TypeKey};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Produces an instance for a requested key, running the pipeline.
pub type Factory =
    Arc<dyn Fn(&Container, &TokenKey, &[Provider]) -> DiResult<Option<Arc<dyn Service>>> + Send + Sync>;

pub(crate) struct ContainerState {
    factories: RwLock<FxHashMap<TokenKey, Factory>>,
    singletons: RwLock<FxHashMap<TokenKey, Arc<dyn Service>>>,
    provide_types: RwLock<FxHashMap<TokenKey, TypeKey>>,
    chain: ResolverChain,
    parent: Weak<ContainerState>,
    registry: Arc<TypeRegistry>,
    scope: Arc<LifeScope>,
    cache: CacheManager,
}

/// Shared handle to one container.
#[derive(Clone)]
pub struct Container {
    state: Arc<ContainerState>,
}

impl Container {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(TypeRegistry::new()), CacheManager::new())
    }

    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self::with_parts(registry, CacheManager::new())
    }

    pub fn with_parts(registry: Arc<TypeRegistry>, cache: CacheManager) -> Self {
        Self {
            state: Arc::new(ContainerState {
                factories: RwLock::new(FxHashMap::default()),
                singletons: RwLock::new(FxHashMap::default()),
                provide_types: RwLock::new(FxHashMap::default()),
                chain: ResolverChain::new(),
                parent: Weak::new(),
                registry,
                scope: Arc::new(LifeScope::new()),
                cache,
            }),
        }
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Create a child container sharing this container's type
    /// registry. The child keeps only a weak reference upward.
    pub fn create_child(&self) -> Container {
        Container {
            state: Arc::new(ContainerState {
                factories: RwLock::new(FxHashMap::default()),
                singletons: RwLock::new(FxHashMap::default()),
                provide_types: RwLock::new(FxHashMap::default()),
                chain: ResolverChain::new(),
                parent: Arc::downgrade(&self.state),
                registry: self.state.registry.clone(),
                scope: Arc::new(LifeScope::new()),
                cache: CacheManager::new(),
            }),
        }
    }

    pub fn parent(&self) -> Option<Container> {
        self.state.parent.upgrade().map(|state| Container { state })
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.state.registry
    }

    pub fn life_scope(&self) -> &Arc<LifeScope> {
        &self.state.scope
    }

    pub fn cache(&self) -> &CacheManager {
        &self.state.cache
    }

    /// Add a fallback resolver, consulted before the parent.
    pub fn add_resolver(&self, resolver: Arc<dyn TokenResolver>) {
        self.state.chain.add(resolver);
    }

    // ── Registration ──

    /// Register a type under its own token. Idempotent: a second call
    /// for an already-registered key is a silent no-op.
    pub fn register<T: Service>(&self) -> DiResult<()> {
        self.register_token(&Token::of::<T>())
    }

    /// Register any type-shaped token, running the design phase.
    pub fn register_token(&self, token: &Token) -> DiResult<()> {
        let key = token.key();
        if self.has_register(&key) {
            debug!(%token, "already registered; keeping existing factory");
            return Ok(());
        }
        let type_key = token.type_key().ok_or_else(|| DiError::InvalidTarget {
            target: token.to_string(),
        })?;
        let info = self
            .state
            .registry
            .info(type_key.id)
            .ok_or_else(|| DiError::InvalidTarget {
                target: type_key.name.to_string(),
            })?;
        if info.is_abstract || info.construct.is_none() {
            return Err(DiError::InvalidTarget {
                target: type_key.name.to_string(),
            });
        }

        self.state
            .factories
            .write()
            .insert(key, pipeline_factory(type_key.id));
        trace!(%token, "registered");

        self.state.scope.run_design(self, type_key.id)
    }

    /// Pin a ready-made singleton under the type's own token.
    pub fn register_singleton<T: Service>(&self, value: T) -> DiResult<()> {
        self.register_value(&Token::of::<T>(), Arc::new(value))
    }

    /// Register a fixed value under an arbitrary token.
    pub fn register_value(&self, token: &Token, value: Arc<dyn Service>) -> DiResult<()> {
        let key = token.key();
        if self.has_register(&key) {
            debug!(%token, "already registered; keeping existing value");
            return Ok(());
        }
        self.state.singletons.write().insert(key.clone(), value);
        let singleton_key = key.clone();
        self.state.factories.write().insert(
            key,
            Arc::new(move |container: &Container, _: &TokenKey, _: &[Provider]| {
                Ok(container.get_singleton(&singleton_key))
            }),
        );
        Ok(())
    }

    /// Bind `provide` to a concrete implementation, overriding any
    /// existing binding. Alias chains are flattened at bind time, so
    /// `get_token_impl` answers with a single lookup.
    pub fn bind_provider(&self, provide: &Token, implementation: &Token) -> DiResult<()> {
        let impl_type = match implementation.type_key() {
            Some(type_key) => type_key,
            // The provide table is kept flat, so one hop resolves any
            // previously bound alias.
            None => {
                let key = implementation.key();
                self.state
                    .provide_types
                    .read()
                    .get(&key)
                    .copied()
                    .ok_or_else(|| DiError::InvalidTarget {
                        target: format!("unbound alias {implementation}"),
                    })?
            }
        };

        if !self.has_register(&TokenKey::Type(impl_type.id))
            && self.state.registry.is_registered(impl_type.id)
        {
            self.register_token(&Token::Type(impl_type))?;
        }

        self.state
            .provide_types
            .write()
            .insert(provide.key(), impl_type);
        self.state
            .factories
            .write()
            .insert(provide.key(), pipeline_factory(impl_type.id));
        debug!(%provide, implementation = impl_type.name, "provider bound");
        Ok(())
    }

    /// Remove a local registration; pinned singletons are destroyed.
    pub fn unregister(&self, token: &Token) {
        let key = token.key();
        self.state.factories.write().remove(&key);
        self.state.provide_types.write().remove(&key);
        if let Some(value) = self.state.singletons.write().remove(&key) {
            self.run_destroy_hook(&value);
        }
        if let Some(type_key) = token.type_key() {
            self.state.cache.destroy(type_key.id);
        }
    }

    /// Destroy all pinned singletons and drop local registrations.
    pub fn dispose(&self) {
        let values: Vec<Arc<dyn Service>> =
            self.state.singletons.write().drain().map(|(_, v)| v).collect();
        for value in values {
            self.run_destroy_hook(&value);
        }
        self.state.factories.write().clear();
        self.state.provide_types.write().clear();
    }

    fn run_destroy_hook(&self, value: &Arc<dyn Service>) {
        let type_id = value.as_ref().as_any().type_id();
        if let Some(hook) = self
            .state
            .registry
            .info(type_id)
            .and_then(|info| info.on_destroy.clone())
        {
            hook(value.as_ref());
        }
    }

    // ── Queries ──

    /// Local-only registration check; no chain walk.
    pub fn has_register(&self, key: &TokenKey) -> bool {
        self.state.factories.read().contains_key(key)
            || self.state.singletons.read().contains_key(key)
    }

    /// Chain-aware registration check.
    pub fn has(&self, token: &Token) -> bool {
        let key = token.key();
        self.has_register(&key)
            || self.state.chain.has(&key)
            || self.parent().map_or(false, |p| p.has(token))
    }

    /// The concrete implementation behind a token, if any.
    pub fn get_token_impl(&self, token: &Token) -> Option<TypeKey> {
        let key = token.key();
        if let Some(type_key) = self.state.provide_types.read().get(&key) {
            return Some(*type_key);
        }
        if let Some(type_key) = token.type_key() {
            if self.state.registry.is_registered(type_key.id) {
                return Some(type_key);
            }
        }
        self.parent().and_then(|p| p.get_token_impl(token))
    }

    /// The implementation's class hierarchy, nearest type first.
    pub fn get_token_extends_chain(&self, token: &Token) -> Vec<TypeKey> {
        match self.get_token_impl(token) {
            Some(type_key) => self.state.registry.extends_chain(type_key.id),
            None => Vec::new(),
        }
    }

    // ── Resolution ──

    /// Chain-aware typed resolve.
    pub fn resolve<T: Service>(&self, providers: &[Provider]) -> DiResult<Option<Arc<T>>> {
        Ok(self
            .resolve_token(&Token::of::<T>(), providers)?
            .and_then(|value| downcast_shared(&value)))
    }

    pub fn resolve_token(
        &self,
        token: &Token,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        self.resolve_key(&token.key(), providers)
    }

    /// Chain-aware resolve by canonical key. `Ok(None)` means
    /// unregistered anywhere along the chain — never an error.
    pub fn resolve_key(
        &self,
        key: &TokenKey,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        if let Some(existing) = self.get_singleton(key) {
            return Ok(Some(existing));
        }
        let factory = self.state.factories.read().get(key).cloned();
        if let Some(factory) = factory {
            return factory(self, key, providers);
        }
        if self.state.chain.has(key) {
            return self.state.chain.resolve(key, providers);
        }
        if let Some(parent) = self.parent() {
            return parent.resolve_key(key, providers);
        }
        debug!(%key, "token not registered; resolving to none");
        Ok(None)
    }

    /// Local-only resolve; never consults resolvers or the parent.
    pub fn resolve_value(
        &self,
        token: &Token,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        let key = token.key();
        if let Some(existing) = self.get_singleton(&key) {
            return Ok(Some(existing));
        }
        let factory = self.state.factories.read().get(&key).cloned();
        match factory {
            Some(factory) => factory(self, &key, providers),
            None => Ok(None),
        }
    }

    pub(crate) fn get_singleton(&self, key: &TokenKey) -> Option<Arc<dyn Service>> {
        self.state.singletons.read().get(key).cloned()
    }

    pub(crate) fn pin_singleton(&self, key: TokenKey, value: Arc<dyn Service>) {
        self.state.singletons.write().insert(key, value);
    }

    // ── Invocation ──

    /// Call a declared method on a resolved instance with DI-built
    /// arguments. Missing targets and methods are programmer errors.
    pub fn sync_invoke(
        &self,
        token: &Token,
        method: &str,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        let instance = self
            .resolve_token(token, &[])?
            .ok_or_else(|| DiError::TargetNotResolved {
                token: token.to_string(),
            })?;
        let impl_type = self
            .get_token_impl(token)
            .ok_or_else(|| DiError::TargetNotResolved {
                token: token.to_string(),
            })?;
        let info = self
            .state
            .registry
            .info(impl_type.id)
            .ok_or_else(|| DiError::InvalidTarget {
                target: impl_type.name.to_string(),
            })?;
        let spec = info.method(method).ok_or_else(|| DiError::MethodNotFound {
            target: impl_type.name.to_string(),
            method: method.to_string(),
        })?;

        let mut map = ProviderMap::parse(self, &spec.providers);
        map.parse_into(self, providers);

        let mut args: ArgList = Vec::with_capacity(spec.params.len());
        for (index, param) in spec.params.iter().enumerate() {
            let mut value = map.for_param(self, param, index);
            if value.is_none() {
                if let Some(param_token) = &param.token {
                    value = self.resolve_token(param_token, &[])?;
                }
            }
            args.push(value);
        }
        (spec.invoke)(instance.as_ref(), &args)
    }

    /// Async face of [`sync_invoke`](Self::sync_invoke).
    pub async fn invoke(
        &self,
        token: &Token,
        method: &str,
        providers: &[Provider],
    ) -> DiResult<Option<Arc<dyn Service>>> {
        self.sync_invoke(token, method, providers)
    }
}

/// Factory that runs the lifecycle pipeline for one concrete type,
/// pinning results under whatever key was requested.
fn pipeline_factory(type_id: TypeId) -> Factory {
    Arc::new(move |container: &Container, requested: &TokenKey, providers: &[Provider]| {
        let registry = container.registry();
        let info = registry.info(type_id).ok_or_else(|| DiError::InvalidTarget {
            target: format!("{:?}", type_id),
        })?;
        let mut ctx = ResolutionContext::new(requested.clone(), Some(info.key));
        ctx.providers = providers.to_vec();
        ctx.singleton = registry.is_singleton(type_id);
        ctx.expires_ms = registry.expires_ms(type_id);
        container.life_scope().run_runtime(container, &mut ctx)?;
        Ok(ctx.exec_result)
    })
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("factories", &self.state.factories.read().len())
            .field("singletons", &self.state.singletons.read().len())
            .field("resolvers", &self.state.chain.len())
            .field("has_parent", &self.state.parent.upgrade().is_some())
            .finish()
    }
}
