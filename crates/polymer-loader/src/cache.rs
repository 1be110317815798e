//! Shared spec cache
//!
//! One bounded LRU map from qualname to spec, shared by every Finder in the
//! process. Hits are returned as-is; nothing is re-validated.

use lru::LruCache;
use polymer_core::{ModuleSpec, QualName};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

pub struct SpecCache {
    inner: Mutex<CacheInner>,
}

pub(crate) struct CacheInner {
    entries: LruCache<QualName, ModuleSpec>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    pub(crate) fn get(&mut self, qualname: &QualName) -> Option<ModuleSpec> {
        match self.entries.get(qualname).cloned() {
            Some(spec) => {
                self.hits += 1;
                Some(spec)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub(crate) fn insert(&mut self, spec: ModuleSpec) -> Option<QualName> {
        let key = spec.name().clone();
        match self.entries.push(key.clone(), spec) {
            Some((old, _)) if old != key => {
                self.evictions += 1;
                debug!("Spec cache full, evicted {}", old);
                Some(old)
            }
            _ => None,
        }
    }

    pub(crate) fn remove(&mut self, qualname: &QualName) -> bool {
        self.entries.pop(qualname).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl SpecCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Look up a spec, marking it most recently used.
    pub fn get(&self, qualname: &QualName) -> Option<ModuleSpec> {
        self.lock().get(qualname)
    }

    /// Insert a spec, evicting the least recently used entry when full.
    ///
    /// Returns the evicted qualname, if any.
    pub fn insert(&self, spec: ModuleSpec) -> Option<QualName> {
        self.lock().insert(spec)
    }

    pub fn remove(&self, qualname: &QualName) -> bool {
        self.lock().remove(qualname)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Membership check that does not touch recency.
    pub fn contains(&self, qualname: &QualName) -> bool {
        self.lock().entries.contains(qualname)
    }

    /// Cached qualnames, most recently used first.
    pub fn keys(&self) -> Vec<QualName> {
        self.lock().entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            len: inner.entries.len(),
            capacity: inner.entries.cap().get(),
        }
    }

    /// First lock in the global order: spec cache, then loader memo.
    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
