//! Inversion-of-control container for Lattice
//!
//! This crate turns pre-extracted structural metadata (constructor
//! parameters, properties, decorator annotations) into a dependency
//! graph and resolves tokens through a staged, decorator-driven
//! lifecycle pipeline: construction → property injection → init hooks
//! → singleton pinning / timed caching.
//!
//! Containers compose hierarchically: a child falls back to its parent
//! for unresolved tokens, while the parent never sees the child's
//! registrations.

pub mod actions;
pub mod builder;
pub mod cache;
pub mod chain;
pub mod container;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod lifescope;
pub mod metadata;
pub mod provider;
pub mod reflect;
pub mod service;
pub mod token;

#[cfg(feature = "config")]
pub mod config;

pub use builder::{BuilderModule, ContainerBuilder};
pub use cache::CacheManager;
pub use chain::TokenResolver;
pub use container::Container;
pub use context::ResolutionContext;
pub use error::{DiError, DiResult};
pub use lifecycle::{AfterInit, BeforeInit, DisposableScope, OnDestroy};
pub use lifescope::LifeScope;
pub use metadata::{decorators, MetadataRecord};
pub use provider::{Provider, ProviderMap};
pub use reflect::{TypeRegistration, TypeRegistry};
pub use service::{arg, downcast_shared, ArgList, Service};
pub use token::{Token, TokenKey, TypeKey};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        arg, Container, ContainerBuilder, DiError, DiResult, Provider, Service, Token,
        TypeRegistration, TypeRegistry,
    };
}
