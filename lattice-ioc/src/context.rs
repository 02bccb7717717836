//! Per-resolution pipeline context
//!
//! One mutable context is threaded by reference through the action
//! tree; a stage communicates with later stages only by writing fields
//! here. The read/write contract of each field is part of the
//! interface:
//!
//! | field | written by | read by |
//! |---|---|---|
//! | `params` | `bind_parameter_types` | `create_args` |
//! | `provider_map` | `create_args`, `bind_method_providers` | `create_args`, `inject_properties` |
//! | `args` | `create_args` | `constructor` |
//! | `target` | `constructor` | `on_init` stages, `after_init` |
//! | `property_tokens` | `bind_property_types` | `inject_properties` |
//! | `exec_result` | `cache_check`, `after_init` | pipeline driver (short-circuits) |

use crate::provider::{Provider, ProviderMap};
use crate::reflect::ParamSpec;
use crate::service::{ArgList, Service};
use crate::token::{Token, TokenKey, TypeKey};
use std::sync::Arc;

/// Mutable state of one resolution (or one design-phase run).
pub struct ResolutionContext {
    /// Canonical key the caller asked for; singletons pin under it.
    pub token_key: TokenKey,
    /// Concrete type being constructed.
    pub target_type: Option<TypeKey>,
    /// Effective constructor parameters (declared types already
    /// overridden by parameter decorators).
    pub params: Vec<ParamSpec>,
    /// Call-site providers, verbatim.
    pub providers: Vec<Provider>,
    /// Normalized provider lookup table.
    pub provider_map: ProviderMap,
    /// Constructor arguments, one slot per parameter, gaps kept.
    pub args: Option<ArgList>,
    /// The instance under construction, before it is shared.
    pub target: Option<Box<dyn Service>>,
    /// Effective property tokens, parallel to the type's property list.
    pub property_tokens: Vec<Option<Token>>,
    /// Pin the result into the singleton store.
    pub singleton: bool,
    /// Hand the result to the cache manager with this TTL.
    pub expires_ms: Option<u64>,
    /// Route constructor hooks through ancestor containers.
    pub raise_container: bool,
    /// Final result; once set, remaining stages are skipped.
    pub exec_result: Option<Arc<dyn Service>>,
}

impl ResolutionContext {
    pub fn new(token_key: TokenKey, target_type: Option<TypeKey>) -> Self {
        Self {
            token_key,
            target_type,
            params: Vec::new(),
            providers: Vec::new(),
            provider_map: ProviderMap::default(),
            args: None,
            target: None,
            property_tokens: Vec::new(),
            singleton: false,
            expires_ms: None,
            raise_container: true,
            exec_result: None,
        }
    }

    /// Context for a design-phase run over a type.
    pub fn for_type(target_type: TypeKey) -> Self {
        Self::new(TokenKey::Type(target_type.id), Some(target_type))
    }

    /// Copy handed to ancestor containers during route execution.
    ///
    /// The instance under construction stays behind, so ancestor
    /// actions can observe the resolution but cannot mutate the
    /// child's state.
    pub fn shallow_copy(&self) -> Self {
        Self {
            token_key: self.token_key.clone(),
            target_type: self.target_type,
            params: self.params.clone(),
            providers: self.providers.clone(),
            provider_map: self.provider_map.clone(),
            args: None,
            target: None,
            property_tokens: self.property_tokens.clone(),
            singleton: self.singleton,
            expires_ms: self.expires_ms,
            raise_container: false,
            exec_result: self.exec_result.clone(),
        }
    }

    /// True once a result exists and the pipeline should stop.
    pub fn is_done(&self) -> bool {
        self.exec_result.is_some()
    }
}
