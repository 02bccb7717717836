//! LifeScope: decorator→action registry and pipeline orchestration
//!
//! Each container owns a LifeScope. It knows which pipeline actions
//! apply to which decorators, drives the design and runtime phases,
//! and answers structural queries about registered types.

use crate::actions::design::{AutorunAction, BindProviderAction};
use crate::actions::runtime::{
    AfterInitAction, BindMethodProvidersAction, BindParameterTypesAction, BindPropertyTypesAction,
    CacheCheckAction, ConstructorAction, CreateArgsAction, InitHooksAction, InjectPropertiesAction,
    RouteConstructorHooksAction,
};
use crate::actions::{Action, ActionNode};
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::metadata::decorators;
use crate::reflect::{ParamSpec, TypeRegistry};
use crate::token::{Token, TypeKey};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::any::TypeId;
use std::sync::Arc;

/// Paths a decorator enables by default when it drives a full
/// construction.
const CORE_RUNTIME: &[&str] = &[
    "runtime.before_create_args",
    "runtime.create_args",
    "runtime.before_constructor",
    "runtime.constructor",
    "runtime.after_constructor",
    "runtime.on_init",
    "runtime.after_init",
];

pub struct LifeScope {
    design: ActionNode,
    runtime: ActionNode,
    decorator_actions: RwLock<FxHashMap<String, Vec<String>>>,
    before_constructor: RwLock<Vec<Arc<dyn Action>>>,
    after_constructor: RwLock<Vec<Arc<dyn Action>>>,
}

impl LifeScope {
    pub fn new() -> Self {
        let design = ActionNode::group("design")
            .with_child(ActionNode::leaf("bind_provider", Arc::new(BindProviderAction)))
            .with_child(ActionNode::leaf("autorun", Arc::new(AutorunAction)));

        let runtime = ActionNode::group("runtime")
            .with_child(
                ActionNode::group("before_create_args")
                    .with_child(ActionNode::leaf(
                        "bind_parameter_types",
                        Arc::new(BindParameterTypesAction),
                    ))
                    .with_child(ActionNode::leaf("cache_check", Arc::new(CacheCheckAction))),
            )
            .with_child(ActionNode::leaf("create_args", Arc::new(CreateArgsAction)))
            .with_child(ActionNode::leaf(
                "before_constructor",
                Arc::new(RouteConstructorHooksAction { after: false }),
            ))
            .with_child(ActionNode::leaf("constructor", Arc::new(ConstructorAction)))
            .with_child(ActionNode::leaf(
                "after_constructor",
                Arc::new(RouteConstructorHooksAction { after: true }),
            ))
            .with_child(
                ActionNode::group("on_init")
                    .with_child(ActionNode::leaf(
                        "bind_property_types",
                        Arc::new(BindPropertyTypesAction),
                    ))
                    .with_child(ActionNode::leaf(
                        "bind_method_providers",
                        Arc::new(BindMethodProvidersAction),
                    ))
                    .with_child(ActionNode::leaf(
                        "inject_properties",
                        Arc::new(InjectPropertiesAction),
                    ))
                    .with_child(ActionNode::leaf("init_hooks", Arc::new(InitHooksAction))),
            )
            .with_child(ActionNode::leaf("after_init", Arc::new(AfterInitAction)));

        let scope = Self {
            design,
            runtime,
            decorator_actions: RwLock::new(FxHashMap::default()),
            before_constructor: RwLock::new(Vec::new()),
            after_constructor: RwLock::new(Vec::new()),
        };

        let mut injectable: Vec<&str> = vec!["design.bind_provider"];
        injectable.extend_from_slice(CORE_RUNTIME);
        scope.register_decorator(decorators::INJECTABLE, &injectable);
        scope.register_decorator(decorators::SINGLETON, &["runtime.after_init"]);
        scope.register_decorator(
            decorators::INJECT,
            &["runtime.create_args", "runtime.on_init.inject_properties"],
        );
        scope.register_decorator(decorators::AUTORUN, &["design.autorun"]);
        scope.register_decorator(
            decorators::IOC_MODULE,
            &["design.bind_provider", "design.autorun"],
        );
        scope.register_decorator(decorators::ABSTRACT, &[]);
        scope
    }

    /// Register which action paths apply to a decorator. The sole
    /// extension point for third-party decorators.
    pub fn register_decorator(&self, decorator: &str, action_paths: &[&str]) {
        self.decorator_actions
            .write()
            .entry(decorator.to_string())
            .or_default()
            .extend(action_paths.iter().map(|p| p.to_string()));
    }

    /// Action paths registered for one decorator.
    pub fn decorator_paths(&self, decorator: &str) -> Vec<String> {
        self.decorator_actions
            .read()
            .get(decorator)
            .cloned()
            .unwrap_or_default()
    }

    /// Install a constructor aspect on this container's scope. Aspects
    /// also run, on shallow context copies, for constructions in
    /// descendant containers.
    pub fn add_before_constructor(&self, aspect: Arc<dyn Action>) {
        self.before_constructor.write().push(aspect);
    }

    pub fn add_after_constructor(&self, aspect: Arc<dyn Action>) {
        self.after_constructor.write().push(aspect);
    }

    pub fn before_constructor_aspects(&self) -> Vec<Arc<dyn Action>> {
        self.before_constructor.read().clone()
    }

    pub fn after_constructor_aspects(&self) -> Vec<Arc<dyn Action>> {
        self.after_constructor.read().clone()
    }

    fn applicable_paths(&self, registry: &TypeRegistry, type_id: TypeId) -> FxHashSet<String> {
        let actions = self.decorator_actions.read();
        registry
            .class_decorators(type_id)
            .into_iter()
            .flat_map(|decorator| {
                actions
                    .get(decorator)
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
                    .iter()
                    .cloned()
            })
            .collect()
    }

    /// Run the design phase for a freshly registered type.
    pub fn run_design(&self, container: &Container, type_id: TypeId) -> DiResult<()> {
        let registry = container.registry();
        let info = registry.info(type_id).ok_or_else(|| DiError::InvalidTarget {
            target: format!("{:?}", type_id),
        })?;
        let applicable = self.applicable_paths(registry, type_id);
        let mut ctx = ResolutionContext::for_type(info.key);
        self.design.execute_applicable(&applicable, container, &mut ctx)
    }

    /// Run the runtime phase: one construction.
    pub fn run_runtime(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Err(DiError::InvalidTarget {
                target: ctx.token_key.to_string(),
            });
        };
        let applicable = self.applicable_paths(container.registry(), target.id);
        self.runtime.execute_applicable(&applicable, container, ctx)
    }

    /// Run one named subtree unconditionally (used by custom
    /// decorator actions).
    pub fn run_path(
        &self,
        path: &str,
        container: &Container,
        ctx: &mut ResolutionContext,
    ) -> DiResult<()> {
        if path.starts_with("design") {
            self.design.execute_path(path, container, ctx)
        } else {
            self.runtime.execute_path(path, container, ctx)
        }
    }

    // Structural queries.

    pub fn get_constructor_parameters(
        &self,
        registry: &TypeRegistry,
        type_id: TypeId,
    ) -> Vec<ParamSpec> {
        registry
            .info(type_id)
            .map(|info| info.params.clone())
            .unwrap_or_default()
    }

    pub fn is_singleton(&self, registry: &TypeRegistry, type_id: TypeId) -> bool {
        registry.is_singleton(type_id)
    }

    pub fn get_class_chain(&self, registry: &TypeRegistry, type_id: TypeId) -> Vec<TypeKey> {
        registry.extends_chain(type_id)
    }

    /// A dependency the pipeline may register on its own: a concrete,
    /// non-abstract, decorator-annotated, constructible class.
    pub fn is_valid_dependence(&self, registry: &TypeRegistry, token: &Token) -> bool {
        let Some(type_key) = token.type_key() else {
            return false;
        };
        let Some(info) = registry.info(type_key.id) else {
            return false;
        };
        !info.is_abstract && info.construct.is_some() && registry.has_class_decorator(type_key.id)
    }
}

impl Default for LifeScope {
    fn default() -> Self {
        Self::new()
    }
}
