//! Call-site providers and the provider map
//!
//! Providers override how individual dependencies are satisfied for a
//! single resolution. The heterogeneous shapes are normalized into a
//! [`ProviderMap`] once per top-level resolve; the map is never
//! persisted.

use crate::container::Container;
use crate::error::DiResult;
use crate::reflect::ParamSpec;
use crate::service::{ArgList, Service};
use crate::token::{Token, TokenKey};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Factory used by [`Provider::Factory`]; receives its eagerly resolved
/// deps as an argument list.
pub type ProviderFactory = Arc<dyn Fn(&ArgList) -> DiResult<Arc<dyn Service>> + Send + Sync>;

/// A call-site override for one token during one resolution.
#[derive(Clone)]
pub enum Provider {
    /// A bare class token: auto-registered if valid, resolved on demand.
    Type(Token),
    /// Fixed value for a token.
    Value {
        provide: Token,
        value: Arc<dyn Service>,
    },
    /// Substitute class for a token.
    Class { provide: Token, use_class: Token },
    /// Factory with eagerly resolved dependencies.
    Factory {
        provide: Token,
        deps: Vec<Token>,
        factory: ProviderFactory,
    },
    /// Redirect to an already-registered token.
    Existing {
        provide: Token,
        use_existing: Token,
    },
    /// Named-token shortcut, matched against parameter names.
    Named {
        name: String,
        value: Arc<dyn Service>,
    },
    /// Positional value, matched by parameter index.
    Indexed {
        index: usize,
        value: Arc<dyn Service>,
    },
}

impl Provider {
    pub fn of_type(token: Token) -> Self {
        Provider::Type(token)
    }

    pub fn value<T: Service>(provide: Token, value: T) -> Self {
        Provider::Value {
            provide,
            value: Arc::new(value),
        }
    }

    pub fn class(provide: Token, use_class: Token) -> Self {
        Provider::Class { provide, use_class }
    }

    pub fn factory(
        provide: Token,
        deps: Vec<Token>,
        factory: impl Fn(&ArgList) -> DiResult<Arc<dyn Service>> + Send + Sync + 'static,
    ) -> Self {
        Provider::Factory {
            provide,
            deps,
            factory: Arc::new(factory),
        }
    }

    pub fn existing(provide: Token, use_existing: Token) -> Self {
        Provider::Existing {
            provide,
            use_existing,
        }
    }

    pub fn named<T: Service>(name: impl Into<String>, value: T) -> Self {
        Provider::Named {
            name: name.into(),
            value: Arc::new(value),
        }
    }

    pub fn pos<T: Service>(index: usize, value: T) -> Self {
        Provider::Indexed {
            index,
            value: Arc::new(value),
        }
    }
}

/// Resolved form of one provider: either a pinned instance or a token
/// to resolve at use time.
#[derive(Clone)]
enum MapEntry {
    Instance(Arc<dyn Service>),
    Token(Token),
}

/// Token/name/position lookup table built from call-site providers.
#[derive(Clone, Default)]
pub struct ProviderMap {
    by_key: FxHashMap<TokenKey, MapEntry>,
    by_name: FxHashMap<String, MapEntry>,
    by_index: FxHashMap<usize, MapEntry>,
}

impl ProviderMap {
    /// Normalize `providers` into a fresh map.
    ///
    /// Broken entries (failing factories, missing `use_existing`
    /// targets) are logged and skipped; matching continues with those
    /// slots unresolved.
    pub fn parse(container: &Container, providers: &[Provider]) -> Self {
        let mut map = Self::default();
        map.parse_into(container, providers);
        map
    }

    /// Merge more providers into an existing map.
    pub fn parse_into(&mut self, container: &Container, providers: &[Provider]) {
        for provider in providers {
            match provider {
                Provider::Type(token) => {
                    auto_register(container, token);
                    self.by_key.insert(token.key(), MapEntry::Token(token.clone()));
                }
                Provider::Value { provide, value } => {
                    self.insert_keyed(provide, MapEntry::Instance(value.clone()));
                }
                Provider::Class { provide, use_class } => {
                    auto_register(container, use_class);
                    self.insert_keyed(provide, MapEntry::Token(use_class.clone()));
                }
                Provider::Factory {
                    provide,
                    deps,
                    factory,
                } => {
                    let mut args: ArgList = Vec::with_capacity(deps.len());
                    for dep in deps {
                        match container.resolve_token(dep, &[]) {
                            Ok(value) => args.push(value),
                            Err(error) => {
                                warn!(%dep, %error, "factory dep failed; slot left empty");
                                args.push(None);
                            }
                        }
                    }
                    match factory(&args) {
                        Ok(value) => self.insert_keyed(provide, MapEntry::Instance(value)),
                        Err(error) => {
                            warn!(%provide, %error, "factory provider failed; skipping")
                        }
                    }
                }
                Provider::Existing {
                    provide,
                    use_existing,
                } => {
                    if container.has(use_existing) {
                        self.insert_keyed(provide, MapEntry::Token(use_existing.clone()));
                    } else {
                        warn!(%provide, missing = %use_existing,
                              "use_existing target not registered; skipping");
                    }
                }
                Provider::Named { name, value } => {
                    self.by_name
                        .insert(name.clone(), MapEntry::Instance(value.clone()));
                }
                Provider::Indexed { index, value } => {
                    self.by_index
                        .insert(*index, MapEntry::Instance(value.clone()));
                }
            }
        }
    }

    fn insert_keyed(&mut self, provide: &Token, entry: MapEntry) {
        if let Token::Name(name) = provide {
            self.by_name.insert(name.to_string(), entry.clone());
        }
        self.by_key.insert(provide.key(), entry);
    }

    /// Match one parameter. Precedence: exact name, declared token,
    /// positional index; `None` when nothing matches.
    pub fn for_param(
        &self,
        container: &Container,
        param: &ParamSpec,
        index: usize,
    ) -> Option<Arc<dyn Service>> {
        if let Some(entry) = self.by_name.get(param.name) {
            return resolve_entry(container, entry);
        }
        if let Some(key) = param.token.as_ref().map(Token::key) {
            if let Some(entry) = self.by_key.get(&key) {
                return resolve_entry(container, entry);
            }
        }
        if let Some(entry) = self.by_index.get(&index) {
            return resolve_entry(container, entry);
        }
        None
    }

    /// Look up an entry by token key only.
    pub fn get_key(&self, container: &Container, key: &TokenKey) -> Option<Arc<dyn Service>> {
        self.by_key
            .get(key)
            .and_then(|entry| resolve_entry(container, entry))
    }

    /// Look up an entry by name only.
    pub fn get_name(&self, container: &Container, name: &str) -> Option<Arc<dyn Service>> {
        self.by_name
            .get(name)
            .and_then(|entry| resolve_entry(container, entry))
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty() && self.by_name.is_empty() && self.by_index.is_empty()
    }
}

fn resolve_entry(container: &Container, entry: &MapEntry) -> Option<Arc<dyn Service>> {
    match entry {
        MapEntry::Instance(value) => Some(value.clone()),
        MapEntry::Token(token) => match container.resolve_token(token, &[]) {
            Ok(value) => value,
            Err(error) => {
                warn!(%token, %error, "provider token failed to resolve");
                None
            }
        },
    }
}

fn auto_register(container: &Container, token: &Token) {
    let key = token.key();
    if container.has_register(&key) {
        return;
    }
    if container.life_scope().is_valid_dependence(container.registry(), token) {
        trace!(%token, "auto-registering provider class");
        if let Err(error) = container.register_token(token) {
            warn!(%token, %error, "auto-registration failed");
        }
    }
}
