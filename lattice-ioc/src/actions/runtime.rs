//! Runtime-phase actions: the construction hot path
//!
//! Executed in tree order on every non-cached construction:
//! `before_create_args` (parameter binding, cache short-circuit) →
//! `create_args` → `before_constructor` → `constructor` →
//! `after_constructor` → `on_init` → `after_init`.

use crate::actions::Action;
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::metadata::{decorators, merge_records};
use crate::provider::ProviderMap;
use crate::reflect::ParamSpec;
use crate::service::{ArgList, Service};
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

fn invalid_target(ctx: &ResolutionContext) -> DiError {
    DiError::InvalidTarget {
        target: ctx
            .target_type
            .map(|t| t.name.to_string())
            .unwrap_or_else(|| ctx.token_key.to_string()),
    }
}

/// Resolves the effective constructor parameter tokens.
///
/// Writes `ctx.params`: declared types overridden by merged parameter
/// decorator metadata. Any dependent class that is a valid dependence
/// and not yet registered is auto-registered here.
pub struct BindParameterTypesAction;

impl Action for BindParameterTypesAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Err(invalid_target(ctx));
        };
        let registry = container.registry();
        let info = registry.info(target.id).ok_or_else(|| invalid_target(ctx))?;
        let inject_meta = registry.get_param_metadata(decorators::INJECT, target.id);

        ctx.params = info
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let merged = inject_meta.get(index).and_then(|r| merge_records(r));
                let token = match merged {
                    Some(record) => record.effective_token().or_else(|| param.token.clone()),
                    None => param.token.clone(),
                };
                ParamSpec {
                    name: param.name,
                    token,
                }
            })
            .collect();

        let scope = container.life_scope();
        for param in &ctx.params {
            if let Some(token) = &param.token {
                if !container.has_register(&token.key())
                    && scope.is_valid_dependence(registry, token)
                {
                    trace!(%token, "auto-registering dependent class");
                    container.register_token(token)?;
                }
            }
        }
        Ok(())
    }
}

/// Short-circuits construction when a pinned or cached instance
/// already satisfies the request and no call-site providers were
/// given. Must run before the constructor phase.
pub struct CacheCheckAction;

impl Action for CacheCheckAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        if !ctx.providers.is_empty() {
            return Ok(());
        }
        if let Some(existing) = container.get_singleton(&ctx.token_key) {
            trace!(key = %ctx.token_key, "singleton hit");
            ctx.exec_result = Some(existing);
            return Ok(());
        }
        if let Some(target) = ctx.target_type {
            if let Some(cached) = container.cache().get(target.id) {
                trace!(ty = %target, "cache hit");
                ctx.exec_result = Some(cached);
            }
        }
        Ok(())
    }
}

/// Builds the constructor argument list.
///
/// Reads `ctx.params`, writes `ctx.provider_map` and `ctx.args`. Per
/// parameter: provider map (name, token, index) first, container
/// resolution of the effective token second; unmatched slots stay
/// `None`. Order always follows parameter index.
pub struct CreateArgsAction;

impl Action for CreateArgsAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        ctx.provider_map = ProviderMap::parse(container, &ctx.providers);
        let mut args: ArgList = Vec::with_capacity(ctx.params.len());
        for (index, param) in ctx.params.iter().enumerate() {
            let mut value = ctx.provider_map.for_param(container, param, index);
            if value.is_none() {
                if let Some(token) = &param.token {
                    value = container.resolve_token(token, &[])?;
                }
            }
            if value.is_none() {
                trace!(param = param.name, "constructor parameter unresolved");
            }
            args.push(value);
        }
        ctx.args = Some(args);
        Ok(())
    }
}

/// Runs registered constructor aspects on the owning container, then
/// routes through every ancestor with a shallow copy of the context.
pub struct RouteConstructorHooksAction {
    pub after: bool,
}

impl Action for RouteConstructorHooksAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let aspects = if self.after {
            container.life_scope().after_constructor_aspects()
        } else {
            container.life_scope().before_constructor_aspects()
        };
        for aspect in aspects {
            aspect.execute(container, ctx)?;
        }
        if !ctx.raise_container {
            return Ok(());
        }
        let mut cursor = container.parent();
        while let Some(ancestor) = cursor {
            let mut shadow = ctx.shallow_copy();
            let aspects = if self.after {
                ancestor.life_scope().after_constructor_aspects()
            } else {
                ancestor.life_scope().before_constructor_aspects()
            };
            for aspect in aspects {
                aspect.execute(&ancestor, &mut shadow)?;
            }
            cursor = ancestor.parent();
        }
        Ok(())
    }
}

/// Invokes the constructor with the built argument array.
pub struct ConstructorAction;

impl Action for ConstructorAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Err(invalid_target(ctx));
        };
        let info = container
            .registry()
            .info(target.id)
            .ok_or_else(|| invalid_target(ctx))?;
        if info.is_abstract {
            return Err(invalid_target(ctx));
        }
        let construct = info.construct.as_ref().ok_or_else(|| invalid_target(ctx))?;
        let args = ctx.args.take().unwrap_or_default();
        ctx.target = Some(construct(&args)?);
        ctx.args = Some(args);
        Ok(())
    }
}

/// Resolves effective property tokens into `ctx.property_tokens`,
/// parallel to the type's property list.
pub struct BindPropertyTypesAction;

impl Action for BindPropertyTypesAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Ok(());
        };
        let registry = container.registry();
        let Some(info) = registry.info(target.id) else {
            return Ok(());
        };
        ctx.property_tokens = info
            .properties
            .iter()
            .map(|prop| {
                let records =
                    registry.get_property_metadata(decorators::INJECT, target.id, prop.name);
                match merge_records(&records) {
                    Some(record) => record.effective_token().or_else(|| prop.token.clone()),
                    None => prop.token.clone(),
                }
            })
            .collect();
        Ok(())
    }
}

/// Merges method-level providers into the resolution's provider map so
/// later stages (and invoked methods) observe them.
pub struct BindMethodProvidersAction;

impl Action for BindMethodProvidersAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Ok(());
        };
        let Some(info) = container.registry().info(target.id) else {
            return Ok(());
        };
        let extra: Vec<_> = info
            .methods
            .iter()
            .flat_map(|m| m.providers.iter().cloned())
            .collect();
        if !extra.is_empty() {
            ctx.provider_map.parse_into(container, &extra);
        }
        Ok(())
    }
}

/// Injects properties into the instance under construction: provider
/// map first, container second; unresolved properties are skipped.
pub struct InjectPropertiesAction;

impl Action for InjectPropertiesAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target_type) = ctx.target_type else {
            return Ok(());
        };
        let Some(info) = container.registry().info(target_type.id) else {
            return Ok(());
        };

        let mut values: Vec<Option<Arc<dyn Service>>> = Vec::with_capacity(info.properties.len());
        for (index, prop) in info.properties.iter().enumerate() {
            let token = ctx
                .property_tokens
                .get(index)
                .cloned()
                .flatten()
                .or_else(|| prop.token.clone());
            let mut value = ctx.provider_map.get_name(container, prop.name);
            if value.is_none() {
                if let Some(token) = &token {
                    value = ctx.provider_map.get_key(container, &token.key());
                }
            }
            if value.is_none() {
                if let Some(token) = &token {
                    value = container.resolve_token(token, &[])?;
                }
            }
            values.push(value);
        }

        let Some(instance) = ctx.target.as_mut() else {
            return Ok(());
        };
        for (prop, value) in info.properties.iter().zip(values) {
            match value {
                Some(value) => {
                    if !(prop.setter)(instance.as_mut(), value) {
                        warn!(property = prop.name, "property setter type mismatch");
                    }
                }
                None => trace!(property = prop.name, "property unresolved; skipped"),
            }
        }
        Ok(())
    }
}

/// Runs the typed lifecycle hook adapters wired at registration.
pub struct InitHooksAction;

impl Action for InitHooksAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target_type) = ctx.target_type else {
            return Ok(());
        };
        let Some(info) = container.registry().info(target_type.id) else {
            return Ok(());
        };
        let Some(instance) = ctx.target.as_mut() else {
            return Ok(());
        };
        if let Some(hook) = &info.before_init {
            hook(instance.as_mut());
        }
        if let Some(hook) = &info.after_init {
            hook(instance.as_mut());
        }
        Ok(())
    }
}

/// Finishes the resolution: shares the instance, pins singletons,
/// stores cache-annotated instances, and publishes `exec_result`.
pub struct AfterInitAction;

impl Action for AfterInitAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(instance) = ctx.target.take() else {
            return Ok(());
        };
        let shared: Arc<dyn Service> = Arc::from(instance);
        if ctx.singleton {
            container.pin_singleton(ctx.token_key.clone(), shared.clone());
        }
        if let Some(ms) = ctx.expires_ms {
            let destroy = ctx
                .target_type
                .and_then(|t| container.registry().info(t.id))
                .and_then(|info| info.on_destroy.clone());
            if let Some(target) = ctx.target_type {
                container
                    .cache()
                    .insert(target, shared.clone(), Duration::from_millis(ms), destroy);
            }
        }
        ctx.exec_result = Some(shared);
        Ok(())
    }
}
