//! The reflection collaborator: an explicit, queryable type registry
//!
//! Nothing here inspects source or relies on language reflection. A
//! type joins the container by describing itself once through
//! [`TypeRegistration`]: constructor parameters, properties, methods,
//! and decorator metadata, plus the closures that actually construct
//! and mutate it. The registry answers the structural queries the
//! pipeline needs.

use crate::error::{DiError, DiResult};
use crate::lifecycle::{AfterInit, BeforeInit, OnDestroy};
use crate::metadata::{decorators, MetadataRecord, MetadataStore};
use crate::provider::Provider;
use crate::service::{ArgList, Service};
use crate::token::{Token, TypeKey};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// Builds one instance from an ordered argument list.
pub type ConstructFn = Arc<dyn Fn(&ArgList) -> DiResult<Box<dyn Service>> + Send + Sync>;

/// Writes one injected property; returns false on a type mismatch.
pub type PropertySetter = Arc<dyn Fn(&mut dyn Service, Arc<dyn Service>) -> bool + Send + Sync>;

/// Invokes one method with DI-built arguments.
pub type MethodFn = Arc<dyn Fn(&dyn Service, &ArgList) -> DiResult<Option<Arc<dyn Service>>> + Send + Sync>;

/// Mutating lifecycle hook adapter (before/after init).
pub type HookFn = Arc<dyn Fn(&mut dyn Service) + Send + Sync>;

/// Destroy hook adapter; shared instances take `&self`.
pub type DestroyFn = Arc<dyn Fn(&dyn Service) + Send + Sync>;

/// One declared constructor or method parameter.
#[derive(Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Declared type token; `None` when the parameter is opaque.
    pub token: Option<Token>,
}

/// One injectable property.
#[derive(Clone)]
pub struct PropSpec {
    pub name: &'static str,
    pub token: Option<Token>,
    pub setter: PropertySetter,
}

/// One invokable method.
#[derive(Clone)]
pub struct MethodSpec {
    pub name: &'static str,
    pub params: Vec<ParamSpec>,
    /// Method-level providers, merged into the provider map on init.
    pub providers: Vec<Provider>,
    pub invoke: MethodFn,
}

/// Everything the pipeline knows about one registered type.
pub struct TypeInfo {
    pub key: TypeKey,
    pub parent: Option<TypeId>,
    pub is_abstract: bool,
    pub params: Vec<ParamSpec>,
    pub properties: Vec<PropSpec>,
    pub methods: Vec<MethodSpec>,
    pub construct: Option<ConstructFn>,
    pub before_init: Option<HookFn>,
    pub after_init: Option<HookFn>,
    pub on_destroy: Option<DestroyFn>,
}

impl TypeInfo {
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Registration builder for one type. Every call mirrors a decorator
/// application: it records metadata and, where relevant, an adapter
/// closure.
pub struct TypeRegistration<T: Service> {
    key: TypeKey,
    parent: Option<TypeId>,
    is_abstract: bool,
    params: Vec<ParamSpec>,
    param_records: Vec<(usize, MetadataRecord)>,
    properties: Vec<PropSpec>,
    prop_records: Vec<(String, MetadataRecord)>,
    methods: Vec<MethodSpec>,
    class_records: Vec<MetadataRecord>,
    construct: Option<ConstructFn>,
    before_init: Option<HookFn>,
    after_init: Option<HookFn>,
    on_destroy: Option<DestroyFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Service> TypeRegistration<T> {
    /// Start a registration; applies the base injectable decorator.
    pub fn injectable() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            parent: None,
            is_abstract: false,
            params: Vec::new(),
            param_records: Vec::new(),
            properties: Vec::new(),
            prop_records: Vec::new(),
            methods: Vec::new(),
            class_records: vec![MetadataRecord::new(decorators::INJECTABLE)],
            construct: None,
            before_init: None,
            after_init: None,
            on_destroy: None,
            _marker: PhantomData,
        }
    }

    /// Mark the type singleton.
    pub fn singleton(mut self) -> Self {
        let mut record = MetadataRecord::new(decorators::SINGLETON);
        record.singleton = true;
        self.class_records.insert(0, record);
        self
    }

    /// Give non-singleton instances a bounded cache lifetime.
    pub fn expires_ms(mut self, ms: u64) -> Self {
        let mut record = MetadataRecord::new(decorators::INJECTABLE);
        record.expires_ms = Some(ms);
        self.class_records.insert(0, record);
        self
    }

    /// Abstract types are never constructed and never auto-registered.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self.class_records
            .insert(0, MetadataRecord::new(decorators::ABSTRACT));
        self
    }

    pub fn extends<P: Service>(mut self) -> Self {
        self.parent = Some(TypeId::of::<P>());
        self
    }

    /// Publish this type under an extra token at registration time.
    pub fn provide(mut self, token: Token) -> Self {
        let mut record = MetadataRecord::new(decorators::INJECTABLE);
        record.provide = Some(token);
        self.class_records.insert(0, record);
        self
    }

    /// Publish under an alias registration of `token`.
    pub fn provide_as(mut self, token: Token, alias: impl Into<String>) -> Self {
        let mut record = MetadataRecord::new(decorators::INJECTABLE);
        record.provide = Some(token);
        record.alias = Some(alias.into());
        self.class_records.insert(0, record);
        self
    }

    /// Run `method` immediately after registration (singletons and
    /// extension modules only).
    pub fn autorun(mut self, method: &'static str) -> Self {
        let mut record = MetadataRecord::new(decorators::AUTORUN);
        record.autorun = Some(method.to_string());
        self.class_records.insert(0, record);
        self
    }

    /// Mark as an IoC extension module.
    pub fn ioc_module(mut self) -> Self {
        self.class_records
            .insert(0, MetadataRecord::new(decorators::IOC_MODULE));
        self
    }

    /// Apply a third-party decorator. Which pipeline actions it
    /// enables is declared separately via
    /// `LifeScope::register_decorator`.
    pub fn decorate(mut self, decorator: &'static str) -> Self {
        self.class_records.insert(0, MetadataRecord::new(decorator));
        self
    }

    /// Declare the next constructor parameter with its runtime type.
    pub fn param<P: Service>(mut self, name: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            token: Some(Token::of::<P>()),
        });
        self
    }

    /// Declare a parameter with an explicit token instead of a type.
    pub fn param_token(mut self, name: &'static str, token: Token) -> Self {
        self.params.push(ParamSpec {
            name,
            token: Some(token),
        });
        self
    }

    /// Apply an inject decorator to the most recently declared
    /// parameter, overriding its resolution token.
    pub fn inject(mut self, token: Token) -> Self {
        let index = self.params.len().saturating_sub(1);
        let mut record = MetadataRecord::new(decorators::INJECT);
        record.provide = Some(token);
        record.index = Some(index);
        self.param_records.push((index, record));
        self
    }

    /// Same, but qualified with an alias descriptor.
    pub fn inject_as(mut self, token: Token, alias: impl Into<String>) -> Self {
        let index = self.params.len().saturating_sub(1);
        let mut record = MetadataRecord::new(decorators::INJECT);
        record.provide = Some(token);
        record.alias = Some(alias.into());
        record.index = Some(index);
        self.param_records.push((index, record));
        self
    }

    /// Declare an injectable property with its setter.
    pub fn property<P: Service>(
        mut self,
        name: &'static str,
        set: impl Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    ) -> Self {
        self.properties.push(PropSpec {
            name,
            token: Some(Token::of::<P>()),
            setter: property_setter::<T, P>(set),
        });
        self
    }

    /// Declare a property resolved through an explicit token.
    pub fn property_token<P: Service>(
        mut self,
        name: &'static str,
        token: Token,
        set: impl Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    ) -> Self {
        let mut record = MetadataRecord::new(decorators::INJECT);
        record.provide = Some(token.clone());
        record.property_key = Some(name.to_string());
        self.prop_records.push((name.to_string(), record));
        self.properties.push(PropSpec {
            name,
            token: Some(token),
            setter: property_setter::<T, P>(set),
        });
        self
    }

    /// Wire the constructor.
    pub fn construct(
        mut self,
        build: impl Fn(&ArgList) -> DiResult<T> + Send + Sync + 'static,
    ) -> Self {
        self.construct = Some(Arc::new(move |args| {
            Ok(Box::new(build(args)?) as Box<dyn Service>)
        }));
        self
    }

    /// Declare an invokable method.
    pub fn method(
        mut self,
        name: &'static str,
        call: impl Fn(&T, &ArgList) -> DiResult<Option<Arc<dyn Service>>> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(MethodSpec {
            name,
            params: Vec::new(),
            providers: Vec::new(),
            invoke: Arc::new(move |svc, args| {
                let target = svc
                    .downcast_ref::<T>()
                    .ok_or_else(|| DiError::ConstructionFailed {
                        target: std::any::type_name::<T>().to_string(),
                        reason: "method receiver type mismatch".to_string(),
                    })?;
                call(target, args)
            }),
        });
        self
    }

    /// Declare a parameter of the most recently declared method.
    pub fn method_param<P: Service>(mut self, name: &'static str) -> Self {
        if let Some(method) = self.methods.last_mut() {
            method.params.push(ParamSpec {
                name,
                token: Some(Token::of::<P>()),
            });
        }
        self
    }

    /// Attach providers to the most recently declared method.
    pub fn method_providers(mut self, providers: Vec<Provider>) -> Self {
        if let Some(method) = self.methods.last_mut() {
            method.providers = providers;
        }
        self
    }

    pub fn with_before_init(mut self) -> Self
    where
        T: BeforeInit,
    {
        self.before_init = Some(Arc::new(|svc: &mut dyn Service| {
            if let Some(target) = svc.downcast_mut::<T>() {
                target.before_init();
            }
        }));
        self
    }

    pub fn with_after_init(mut self) -> Self
    where
        T: AfterInit,
    {
        self.after_init = Some(Arc::new(|svc: &mut dyn Service| {
            if let Some(target) = svc.downcast_mut::<T>() {
                target.after_init();
            }
        }));
        self
    }

    pub fn with_on_destroy(mut self) -> Self
    where
        T: OnDestroy,
    {
        self.on_destroy = Some(Arc::new(|svc: &dyn Service| {
            if let Some(target) = svc.downcast_ref::<T>() {
                target.on_destroy();
            }
        }));
        self
    }
}

fn property_setter<T: Service, P: Service>(
    set: impl Fn(&mut T, Arc<P>) + Send + Sync + 'static,
) -> PropertySetter {
    Arc::new(move |svc: &mut dyn Service, value: Arc<dyn Service>| {
        let Some(target) = svc.downcast_mut::<T>() else {
            return false;
        };
        match value.downcast_arc::<P>() {
            Ok(value) => {
                set(target, value);
                true
            }
            Err(_) => false,
        }
    })
}

struct RegistryInner {
    types: FxHashMap<TypeId, Arc<TypeInfo>>,
    by_name: FxHashMap<String, TypeId>,
    store: MetadataStore,
}

/// Shared registry of type structure and decorator metadata.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                types: FxHashMap::default(),
                by_name: FxHashMap::default(),
                store: MetadataStore::new(),
            }),
        }
    }

    /// Commit a registration: type structure plus all of its metadata
    /// records.
    pub fn define<T: Service>(&self, registration: TypeRegistration<T>) {
        let type_id = registration.key.id;
        let mut inner = self.inner.write();

        for record in registration.class_records.into_iter().rev() {
            inner.store.add_class(type_id, record);
        }
        for (index, mut record) in registration.param_records.into_iter() {
            if record.type_token.is_none() {
                record.type_token = registration
                    .params
                    .get(index)
                    .and_then(|p| p.token.clone());
            }
            inner.store.add_param(type_id, index, record);
        }
        for (key, record) in registration.prop_records.into_iter() {
            inner.store.add_property(type_id, &key, record);
        }

        let info = Arc::new(TypeInfo {
            key: registration.key,
            parent: registration.parent,
            is_abstract: registration.is_abstract,
            params: registration.params,
            properties: registration.properties,
            methods: registration.methods,
            construct: registration.construct,
            before_init: registration.before_init,
            after_init: registration.after_init,
            on_destroy: registration.on_destroy,
        });

        let full_name = registration.key.name;
        inner.by_name.insert(full_name.to_string(), type_id);
        if let Some(short) = full_name.rsplit("::").next() {
            inner.by_name.insert(short.to_string(), type_id);
        }
        inner.types.insert(type_id, info);
    }

    pub fn info(&self, type_id: TypeId) -> Option<Arc<TypeInfo>> {
        self.inner.read().types.get(&type_id).cloned()
    }

    pub fn is_registered(&self, type_id: TypeId) -> bool {
        self.inner.read().types.contains_key(&type_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<TypeInfo>> {
        let inner = self.inner.read();
        let type_id = inner.by_name.get(name)?;
        inner.types.get(type_id).cloned()
    }

    /// The type itself followed by its ancestors, nearest first.
    pub fn extends_chain(&self, type_id: TypeId) -> Vec<TypeKey> {
        let inner = self.inner.read();
        let mut chain = Vec::new();
        let mut cursor = Some(type_id);
        while let Some(id) = cursor {
            match inner.types.get(&id) {
                Some(info) => {
                    chain.push(info.key);
                    cursor = info.parent;
                }
                None => break,
            }
        }
        chain
    }

    /// Records declared directly on the type, newest first.
    pub fn get_own_type_metadata(&self, decorator: &str, type_id: TypeId) -> Vec<MetadataRecord> {
        self.inner
            .read()
            .store
            .own_class(decorator, type_id)
            .to_vec()
    }

    /// Records along the extends chain, nearest type first.
    pub fn get_type_metadata(&self, decorator: &str, type_id: TypeId) -> Vec<MetadataRecord> {
        let chain: Vec<TypeId> = self.extends_chain(type_id).iter().map(|k| k.id).collect();
        let inner = self.inner.read();
        inner
            .store
            .class_chain(decorator, chain)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Per-parameter record lists, by position.
    pub fn get_param_metadata(&self, decorator: &str, type_id: TypeId) -> Vec<Vec<MetadataRecord>> {
        self.inner.read().store.params(decorator, type_id).to_vec()
    }

    pub fn get_property_metadata(
        &self,
        decorator: &str,
        type_id: TypeId,
        key: &str,
    ) -> Vec<MetadataRecord> {
        self.inner
            .read()
            .store
            .property(decorator, type_id, key)
            .to_vec()
    }

    pub fn get_method_metadata(
        &self,
        decorator: &str,
        type_id: TypeId,
        key: &str,
    ) -> Vec<MetadataRecord> {
        self.inner
            .read()
            .store
            .method(decorator, type_id, key)
            .to_vec()
    }

    pub fn class_decorators(&self, type_id: TypeId) -> Vec<&'static str> {
        self.inner.read().store.class_decorators(type_id)
    }

    pub fn has_class_decorator(&self, type_id: TypeId) -> bool {
        self.inner.read().store.has_class_decorator(type_id)
    }

    pub fn has_decorator(&self, type_id: TypeId, decorator: &str) -> bool {
        !self
            .inner
            .read()
            .store
            .own_class(decorator, type_id)
            .is_empty()
    }

    /// Singleton-ness, from the type's own metadata.
    pub fn is_singleton(&self, type_id: TypeId) -> bool {
        let inner = self.inner.read();
        if !inner
            .store
            .own_class(decorators::SINGLETON, type_id)
            .is_empty()
        {
            return true;
        }
        inner
            .store
            .own_class(decorators::INJECTABLE, type_id)
            .iter()
            .any(|r| r.singleton)
    }

    /// Cache TTL from the type's own metadata, newest wins.
    pub fn expires_ms(&self, type_id: TypeId) -> Option<u64> {
        self.inner
            .read()
            .store
            .own_class(decorators::INJECTABLE, type_id)
            .iter()
            .find_map(|r| r.expires_ms)
    }

    /// Autorun method name, when declared.
    pub fn autorun(&self, type_id: TypeId) -> Option<String> {
        self.inner
            .read()
            .store
            .own_class(decorators::AUTORUN, type_id)
            .iter()
            .find_map(|r| r.autorun.clone())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    struct Derived;
    struct Dep;

    #[test]
    fn extends_chain_walks_ancestors() {
        let registry = TypeRegistry::new();
        registry.define(TypeRegistration::<Base>::injectable().abstract_type());
        registry.define(TypeRegistration::<Derived>::injectable().extends::<Base>());

        let chain = registry.extends_chain(TypeId::of::<Derived>());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].id, TypeId::of::<Derived>());
        assert_eq!(chain[1].id, TypeId::of::<Base>());
    }

    #[test]
    fn singleton_flag_is_own_metadata_only() {
        let registry = TypeRegistry::new();
        registry.define(TypeRegistration::<Base>::injectable().singleton());
        registry.define(TypeRegistration::<Derived>::injectable().extends::<Base>());

        assert!(registry.is_singleton(TypeId::of::<Base>()));
        assert!(!registry.is_singleton(TypeId::of::<Derived>()));
    }

    #[test]
    fn inject_records_carry_declared_type_fallback() {
        let registry = TypeRegistry::new();
        registry.define(
            TypeRegistration::<Base>::injectable()
                .param::<Dep>("dep")
                .inject(Token::name("custom")),
        );

        let params = registry.get_param_metadata(decorators::INJECT, TypeId::of::<Base>());
        assert_eq!(params.len(), 1);
        let record = &params[0][0];
        assert_eq!(record.provide.as_ref().unwrap(), &Token::name("custom"));
        assert_eq!(record.type_token.as_ref().unwrap(), &Token::of::<Dep>());
    }

    #[test]
    fn lookup_by_short_name() {
        let registry = TypeRegistry::new();
        registry.define(TypeRegistration::<Base>::injectable());
        assert!(registry.find_by_name("Base").is_some());
        assert!(registry.find_by_name("NoSuchType").is_none());
    }
}
