//! Type-erased service values

use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;

/// Trait that all injectable values satisfy.
///
/// Blanket-implemented for every `Any + Send + Sync` type, so plain
/// structs participate without opting in.
pub trait Service: DowncastSync {
    /// Type name of the concrete service, for diagnostics.
    fn service_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl_downcast!(sync Service);

impl<T: std::any::Any + Send + Sync> Service for T {}

/// Downcast a shared service to a concrete type, cloning the `Arc`.
pub fn downcast_shared<T: Service>(value: &Arc<dyn Service>) -> Option<Arc<T>> {
    value.clone().downcast_arc::<T>().ok()
}

/// Ordered constructor/method argument list.
///
/// One slot per declared parameter; unresolved parameters stay `None`
/// and are never compacted, so indices always line up with the
/// declaration order.
pub type ArgList = Vec<Option<Arc<dyn Service>>>;

/// Pull a typed argument out of an [`ArgList`] by position.
pub fn arg<T: Service>(args: &ArgList, index: usize) -> Option<Arc<T>> {
    args.get(index)
        .and_then(|slot| slot.as_ref())
        .and_then(downcast_shared)
}
