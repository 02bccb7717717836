//! Time-boxed instance cache
//!
//! Holds instances of cache-annotated, non-singleton types for a
//! bounded window. A single sweeper thread is started lazily on the
//! first insert and wakes on a fixed interval; reads check liveness
//! themselves, so an entry racing its own eviction is simply a miss.

use crate::reflect::DestroyFn;
use crate::service::Service;
use crate::token::TypeKey;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    target: Arc<dyn Service>,
    type_name: &'static str,
    expires_at: Instant,
    on_destroy: Option<DestroyFn>,
}

struct CacheInner {
    entries: Mutex<FxHashMap<TypeId, CacheEntry>>,
    sweep_interval: Duration,
    sweeper_started: AtomicBool,
}

/// Expiring instance cache, shared by handle.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<CacheInner>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(FxHashMap::default()),
                sweep_interval,
                sweeper_started: AtomicBool::new(false),
            }),
        }
    }

    /// Store an instance for `ttl`, replacing any previous entry for
    /// the same type.
    pub fn insert(
        &self,
        type_key: TypeKey,
        instance: Arc<dyn Service>,
        ttl: Duration,
        on_destroy: Option<DestroyFn>,
    ) {
        let entry = CacheEntry {
            target: instance,
            type_name: type_key.name,
            expires_at: Instant::now() + ttl,
            on_destroy,
        };
        self.inner.entries.lock().insert(type_key.id, entry);
        trace!(ty = type_key.name, ttl_ms = ttl.as_millis() as u64, "cached instance");
        self.ensure_sweeper();
    }

    /// Fetch a live instance; an expired or just-evicted entry is a
    /// miss.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<dyn Service>> {
        let entries = self.inner.entries.lock();
        let entry = entries.get(&type_id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.target.clone())
    }

    /// Fetch and, when a positive `ttl` is supplied, extend the
    /// entry's lifetime from now. Read access extends lifetime.
    pub fn get_refresh(&self, type_id: TypeId, ttl: Option<Duration>) -> Option<Arc<dyn Service>> {
        let mut entries = self.inner.entries.lock();
        let entry = entries.get_mut(&type_id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        match ttl {
            Some(ttl) if !ttl.is_zero() => {
                entry.expires_at = Instant::now() + ttl;
            }
            _ => {}
        }
        Some(entry.target.clone())
    }

    /// Remove an entry now, running its destroy hook.
    pub fn destroy(&self, type_id: TypeId) {
        let removed = self.inner.entries.lock().remove(&type_id);
        if let Some(entry) = removed {
            run_destroy(&entry);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    fn ensure_sweeper(&self) {
        if self
            .inner
            .sweeper_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let interval = self.inner.sweep_interval;
        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            match weak.upgrade() {
                Some(inner) => sweep(&inner),
                None => break,
            }
        });
    }
}

fn sweep(inner: &CacheInner) {
    let now = Instant::now();
    let expired: Vec<CacheEntry> = {
        let mut entries = inner.entries.lock();
        let dead: Vec<TypeId> = entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        dead.into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    };
    for entry in &expired {
        debug!(ty = entry.type_name, "evicting expired instance");
        run_destroy(entry);
    }
}

fn run_destroy(entry: &CacheEntry) {
    if let Some(hook) = &entry.on_destroy {
        let target = entry.target.clone();
        let hook = hook.clone();
        // Eviction is never rolled back by a failing hook.
        if catch_unwind(AssertUnwindSafe(|| hook(target.as_ref()))).is_err() {
            warn!(ty = entry.type_name, "destroy hook panicked; entry evicted anyway");
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Widget;

    fn key() -> TypeKey {
        TypeKey::of::<Widget>()
    }

    #[test]
    fn insert_then_get() {
        let cache = CacheManager::new();
        cache.insert(key(), Arc::new(Widget), Duration::from_secs(5), None);
        assert!(cache.get(TypeId::of::<Widget>()).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_a_miss_before_sweep() {
        let cache = CacheManager::new();
        cache.insert(key(), Arc::new(Widget), Duration::from_millis(0), None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(TypeId::of::<Widget>()).is_none());
    }

    #[test]
    fn sweeper_destroys_exactly_once() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let hook: DestroyFn = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cache = CacheManager::with_sweep_interval(Duration::from_millis(10));
        cache.insert(key(), Arc::new(Widget), Duration::from_millis(30), Some(hook));
        assert!(cache.get(TypeId::of::<Widget>()).is_some());

        std::thread::sleep(Duration::from_millis(120));
        assert!(cache.get(TypeId::of::<Widget>()).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_access_extends_lifetime() {
        let cache = CacheManager::with_sweep_interval(Duration::from_millis(10));
        cache.insert(key(), Arc::new(Widget), Duration::from_millis(60), None);

        // Keep refreshing past the original expiry.
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(30));
            assert!(cache
                .get_refresh(TypeId::of::<Widget>(), Some(Duration::from_millis(60)))
                .is_some());
        }

        std::thread::sleep(Duration::from_millis(120));
        assert!(cache.get(TypeId::of::<Widget>()).is_none());
    }

    #[test]
    fn destroy_hook_panic_still_evicts() {
        let cache = CacheManager::new();
        let hook: DestroyFn = Arc::new(|_| panic!("boom"));
        cache.insert(key(), Arc::new(Widget), Duration::from_secs(5), Some(hook));
        cache.destroy(TypeId::of::<Widget>());
        assert!(cache.is_empty());
    }
}
