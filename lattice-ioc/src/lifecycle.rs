//! Lifecycle capability traits
//!
//! The pipeline never probes instances reflectively; a type opts into a
//! hook by implementing the trait and wiring the adapter during
//! registration (`TypeRegistration::with_before_init` and friends).

/// Called after construction, before properties are injected.
pub trait BeforeInit {
    fn before_init(&mut self);
}

/// Called once property injection has finished.
pub trait AfterInit {
    fn after_init(&mut self);
}

/// Called when an instance is evicted from the cache, unregistered, or
/// disposed with its container.
pub trait OnDestroy {
    fn on_destroy(&self);
}

/// Scope guard that runs deferred cleanups in reverse order on drop.
pub struct DisposableScope {
    cleanups: Vec<Box<dyn FnOnce() + Send>>,
}

impl DisposableScope {
    pub fn new() -> Self {
        Self {
            cleanups: Vec::new(),
        }
    }

    /// Track a destroyable item for disposal with this scope.
    pub fn add<T: OnDestroy + Send + Sync + 'static>(&mut self, item: std::sync::Arc<T>) {
        self.cleanups.push(Box::new(move || item.on_destroy()));
    }

    /// Defer an arbitrary cleanup.
    pub fn defer(&mut self, cleanup: impl FnOnce() + Send + 'static) {
        self.cleanups.push(Box::new(cleanup));
    }

    /// Manually run all cleanups now, newest first.
    pub fn dispose(&mut self) {
        while let Some(cleanup) = self.cleanups.pop() {
            cleanup();
        }
    }
}

impl Drop for DisposableScope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Default for DisposableScope {
    fn default() -> Self {
        Self::new()
    }
}
