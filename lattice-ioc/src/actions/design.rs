//! Design-phase actions, run once per type at registration time

use crate::actions::Action;
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::error::DiResult;
use crate::metadata::decorators;
use crate::token::Token;
use tracing::{debug, warn};

/// Binds explicit `provide` tokens from class metadata into the
/// container's provide table, so alias lookups hit without walking
/// metadata again.
///
/// Reads only *own* metadata: a subclass never inherits its parent's
/// provider token silently.
pub struct BindProviderAction;

impl Action for BindProviderAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Ok(());
        };
        let registry = container.registry();
        for decorator in [decorators::INJECTABLE, decorators::IOC_MODULE] {
            for record in registry.get_own_type_metadata(decorator, target.id) {
                if let Some(provide) = record.provide_token() {
                    debug!(%provide, implementation = %target, "binding provider");
                    container.bind_provider(&provide, &Token::Type(target))?;
                }
            }
        }
        Ok(())
    }
}

/// Resolves and invokes the `autorun` method of singleton and
/// extension-module types immediately after registration.
pub struct AutorunAction;

impl Action for AutorunAction {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        let Some(target) = ctx.target_type else {
            return Ok(());
        };
        let registry = container.registry();
        let Some(method) = registry.autorun(target.id) else {
            return Ok(());
        };
        let eligible = registry.is_singleton(target.id)
            || registry.has_decorator(target.id, decorators::IOC_MODULE);
        if !eligible {
            return Ok(());
        }
        debug!(ty = %target, method = %method, "autorun after registration");
        if let Err(error) = container.sync_invoke(&Token::Type(target), &method, &[]) {
            warn!(ty = %target, method = %method, %error, "autorun failed");
        }
        Ok(())
    }
}
