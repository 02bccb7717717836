//! Container builder for fluent composition-root setup
//!
//! The builder is the composition root's way of assembling a
//! container: type registrations, fixed values, and provider bindings
//! are collected and applied in order when `build` runs.

use crate::cache::CacheManager;
use crate::container::Container;
use crate::error::DiResult;
use crate::reflect::{TypeRegistration, TypeRegistry};
use crate::service::Service;
use crate::token::Token;
use std::sync::Arc;
use std::time::Duration;

type SetupFn = Box<dyn FnOnce(&Container) -> DiResult<()> + Send>;

pub struct ContainerBuilder {
    registry: Arc<TypeRegistry>,
    sweep_interval: Option<Duration>,
    setup: Vec<SetupFn>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(TypeRegistry::new()),
            sweep_interval: None,
            setup: Vec::new(),
        }
    }

    /// Build against an existing (possibly shared) type registry.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            sweep_interval: None,
            setup: Vec::new(),
        }
    }

    /// Override the cache sweep interval (tests mostly).
    pub fn sweep_interval(&mut self, interval: Duration) -> &mut Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Define a type and register it in the built container.
    pub fn register<T: Service>(&mut self, registration: TypeRegistration<T>) -> &mut Self {
        self.registry.define(registration);
        let token = Token::of::<T>();
        self.setup
            .push(Box::new(move |container| container.register_token(&token)));
        self
    }

    /// Define a type without registering it (resolved via providers or
    /// auto-registration later).
    pub fn define<T: Service>(&mut self, registration: TypeRegistration<T>) -> &mut Self {
        self.registry.define(registration);
        self
    }

    /// Register a fixed value under a token.
    pub fn register_value<T: Service>(&mut self, token: Token, value: T) -> &mut Self {
        let value: Arc<dyn Service> = Arc::new(value);
        self.setup
            .push(Box::new(move |container| container.register_value(&token, value)));
        self
    }

    /// Pin a ready-made singleton under its own type token.
    pub fn register_singleton<T: Service>(&mut self, value: T) -> &mut Self {
        self.setup
            .push(Box::new(move |container| container.register_singleton(value)));
        self
    }

    /// Bind a provide token to an implementation.
    pub fn bind_provider(&mut self, provide: Token, implementation: Token) -> &mut Self {
        self.setup.push(Box::new(move |container| {
            container.bind_provider(&provide, &implementation)
        }));
        self
    }

    /// Apply a module of registrations.
    pub fn add_module<M: BuilderModule>(mut self, module: M) -> Self {
        module.configure(&mut self);
        self
    }

    /// Build the container and run all queued registrations in order.
    pub fn build(self) -> DiResult<Container> {
        let cache = match self.sweep_interval {
            Some(interval) => CacheManager::with_sweep_interval(interval),
            None => CacheManager::new(),
        };
        let container = Container::with_parts(self.registry, cache);
        for setup in self.setup {
            setup(&container)?;
        }
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A reusable bundle of registrations.
pub trait BuilderModule {
    fn configure(&self, builder: &mut ContainerBuilder);
}
