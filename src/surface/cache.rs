//! Memoization of best-fit spheres.
//!
//! Fitting a reference sphere needs the sag at both radial bounds, which for
//! the implicit families means two full solver runs. The model only depends
//! on the surface parameters, so it is cached per [`SurfaceKey`].
//!
//! # Features
//! - Bounded capacity with first-in-first-out eviction
//! - Owned by an engine instance; invalidation per surface or wholesale
//! - Safe to share between threads; a miss computed twice is only wasted work
//! - Hit/miss/eviction statistics for diagnostics
//!
//! # Example
//! ```ignore
//! let cache = BestFitSphereCache::with_capacity(64);
//! let sphere = cache.get_or_insert_with(surface.key(), || BestFitSphere::fit(&surface, &solvers));
//! println!("hit rate: {:.2}", cache.stats().hit_rate());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use super::best_fit::BestFitSphere;
use super::model::SurfaceKey;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct Entries {
    spheres: HashMap<SurfaceKey, BestFitSphere>,
    /// Insertion order, oldest first.
    order: VecDeque<SurfaceKey>,
}

/// Bounded, thread-safe best-fit sphere cache.
#[derive(Debug)]
pub struct BestFitSphereCache {
    entries: RwLock<Entries>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
    evictions: AtomicUsize,
}

/// Snapshot of the sphere cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestFitCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

impl BestFitCacheStats {
    /// Fraction of sphere lookups served without refitting; 0 before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Default for BestFitSphereCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl BestFitSphereCache {
    /// A capacity of 0 disables caching; every lookup recomputes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            evictions: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn stats(&self) -> BestFitCacheStats {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .spheres
            .len();
        BestFitCacheStats {
            entries,
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Returns the cached sphere for `key`, computing and storing it with
    /// `make` on a miss. `make` runs without holding the lock.
    pub fn get_or_insert_with(
        &self,
        key: SurfaceKey,
        make: impl FnOnce() -> BestFitSphere,
    ) -> BestFitSphere {
        if let Some(sphere) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return sphere;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let sphere = make();
        self.insert(key, sphere);
        sphere
    }

    #[must_use]
    pub fn get(&self, key: &SurfaceKey) -> Option<BestFitSphere> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .spheres
            .get(key)
            .copied()
    }

    #[must_use]
    pub fn contains(&self, key: &SurfaceKey) -> bool {
        self.get(key).is_some()
    }

    fn insert(&self, key: SurfaceKey, sphere: BestFitSphere) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.spheres.insert(key.clone(), sphere).is_some() {
            // Another thread filled the same slot first.
            return;
        }
        entries.order.push_back(key);
        while entries.spheres.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            if entries.spheres.remove(&oldest).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drops the entry for one surface. Returns whether it was cached.
    pub fn invalidate(&self, key: &SurfaceKey) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.spheres.remove(key).is_some();
        if removed {
            entries.order.retain(|queued| queued != key);
        }
        removed
    }

    /// Forgets every fitted sphere and zeroes the counters.
    pub fn clear(&self) {
        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.spheres.clear();
            entries.order.clear();
        }
        self.reset_counters();
    }

    /// Zeroes hits, misses and evictions; fitted spheres stay cached.
    pub fn reset_counters(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}
