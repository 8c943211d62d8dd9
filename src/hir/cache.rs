//! Resolution cache - (declaration, phase) → phase result.
//!
//! Entries are immutable `Arc<PhaseResult>`s. Invalidation is O(1): it only
//! bumps the file's generation in the ledger. Staleness is found lazily by
//! the next `get`, which compares the entry's stamp against the ledger and
//! removes the entry if it no longer matches.
//!
//! Eviction is by recency of access. Keys pinned by an in-flight
//! computation (its prerequisites) are never evicted, and evicting a phase
//! also evicts the later phases of the same declaration so that a cached
//! phase always has its earlier phases cached too.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use super::ids::DeclId;
use super::ledger::{ModificationLedger, StaleFile};
use super::output::PhaseResult;
use super::phase::{Phase, PhaseSet};
use crate::base::FileId;

/// Cache key.
pub type CacheKey = (DeclId, Phase);

struct CacheEntry {
    result: Arc<PhaseResult>,
    last_access: AtomicU64,
}

/// Result of a cache lookup.
#[derive(Debug)]
pub(crate) enum CacheLookup {
    /// Present and every stamped generation is current.
    Hit(Arc<PhaseResult>),
    /// Present but computed against an old generation; the entry was removed.
    Stale(StaleFile),
    Miss,
}

/// Counters reported by [`ResolutionCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CacheStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) stale: u64,
    pub(crate) evictions: u64,
    pub(crate) entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    evictions: AtomicU64,
}

/// Session-owned cache of phase results.
pub(crate) struct ResolutionCache {
    ledger: Arc<ModificationLedger>,
    entries: RwLock<FxHashMap<CacheKey, Arc<CacheEntry>>>,
    clock: AtomicU64,
    pins: Mutex<FxHashMap<CacheKey, usize>>,
    counters: Counters,
}

impl ResolutionCache {
    pub(crate) fn new(ledger: Arc<ModificationLedger>) -> Self {
        Self {
            ledger,
            entries: RwLock::new(FxHashMap::default()),
            clock: AtomicU64::new(0),
            pins: Mutex::new(FxHashMap::default()),
            counters: Counters::default(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up a result, validating its stamp against the ledger.
    pub(crate) fn get(&self, decl: &DeclId, phase: Phase) -> CacheLookup {
        let key = (decl.clone(), phase);
        let Some(entry) = self.entries.read().get(&key).cloned() else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(decl = %decl, %phase, "cache miss");
            return CacheLookup::Miss;
        };

        match self.ledger.first_stale(&entry.result.stamp) {
            None => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(decl = %decl, %phase, "cache hit");
                CacheLookup::Hit(Arc::clone(&entry.result))
            }
            Some(stale) => {
                self.counters.stale.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    decl = %decl,
                    %phase,
                    file = %stale.file,
                    stamped = stale.stamped,
                    current = stale.current,
                    "stale cache entry"
                );
                let mut entries = self.entries.write();
                // Only drop the entry we validated; a fresh one may have replaced it.
                if entries
                    .get(&key)
                    .is_some_and(|current| Arc::ptr_eq(current, &entry))
                {
                    entries.remove(&key);
                }
                CacheLookup::Stale(stale)
            }
        }
    }

    /// Store a result, replacing whatever was cached for its key.
    pub(crate) fn put(&self, result: PhaseResult) -> Arc<PhaseResult> {
        let key = (result.decl.clone(), result.phase);
        let result = Arc::new(result);
        let entry = Arc::new(CacheEntry {
            result: Arc::clone(&result),
            last_access: AtomicU64::new(self.tick()),
        });
        self.entries.write().insert(key, entry);
        result
    }

    /// Invalidate everything that read `file`. Returns the new generation.
    pub(crate) fn invalidate(&self, file: FileId) -> u64 {
        self.ledger.bump(file)
    }

    /// Whether `result` is still the entry cached for its key.
    pub(crate) fn holds(&self, result: &Arc<PhaseResult>) -> bool {
        self.entries
            .read()
            .get(&(result.decl.clone(), result.phase))
            .is_some_and(|entry| Arc::ptr_eq(&entry.result, result))
    }

    /// Phases of `decl` with a currently valid entry.
    pub(crate) fn valid_phases(&self, decl: &DeclId) -> PhaseSet {
        let entries = self.entries.read();
        Phase::ALL
            .into_iter()
            .filter(|&phase| {
                entries
                    .get(&(decl.clone(), phase))
                    .is_some_and(|entry| self.ledger.is_current(&entry.result.stamp))
            })
            .collect()
    }

    /// Protect `key` from eviction until the guard drops.
    pub(crate) fn pin(&self, key: CacheKey) -> PinGuard<'_> {
        *self.pins.lock().entry(key.clone()).or_insert(0) += 1;
        PinGuard { cache: self, key }
    }

    fn unpin(&self, key: &CacheKey) {
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                pins.remove(key);
            }
        }
    }

    /// Evict up to `count` least recently accessed entries.
    ///
    /// Later phases of an evicted declaration go with it. An entry is kept
    /// if it or any later phase of the same declaration is pinned. Returns
    /// every removed key.
    pub(crate) fn evict_lru(&self, count: usize) -> Vec<CacheKey> {
        if count == 0 {
            return Vec::new();
        }
        // Held for the whole sweep so no key can be pinned mid-eviction.
        let pins = self.pins.lock();
        let mut entries = self.entries.write();

        let mut by_access: Vec<(u64, CacheKey)> = entries
            .iter()
            .map(|(key, entry)| (entry.last_access.load(Ordering::Relaxed), key.clone()))
            .collect();
        by_access.sort_unstable_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let blocked = |decl: &DeclId, phase: Phase| {
            Phase::ALL
                .into_iter()
                .filter(|&p| p >= phase)
                .any(|p| pins.contains_key(&(decl.clone(), p)))
        };

        let mut evicted: Vec<CacheKey> = Vec::new();
        let mut seen: FxHashSet<CacheKey> = FxHashSet::default();
        let mut chosen = 0;
        for (_, (decl, phase)) in by_access {
            if chosen == count {
                break;
            }
            if seen.contains(&(decl.clone(), phase)) || blocked(&decl, phase) {
                continue;
            }
            chosen += 1;
            for later in Phase::ALL.into_iter().filter(|&p| p >= phase) {
                let key = (decl.clone(), later);
                if entries.remove(&key).is_some() && seen.insert(key.clone()) {
                    evicted.push(key);
                }
            }
        }

        self.counters
            .evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), remaining = entries.len(), "evicted cache entries");
        }
        evicted
    }

    /// Evict down to `capacity - batch` entries once `capacity` is exceeded.
    pub(crate) fn enforce_capacity(&self, capacity: usize, batch: usize) -> Vec<CacheKey> {
        let len = self.len();
        if len <= capacity {
            return Vec::new();
        }
        self.evict_lru(len - capacity + batch)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("entries", &self.len())
            .field("pinned", &self.pins.lock().len())
            .finish()
    }
}

/// Keeps a cache key pinned while alive.
pub(crate) struct PinGuard<'c> {
    cache: &'c ResolutionCache,
    key: CacheKey,
}

impl Drop for PinGuard<'_> {
    fn drop(&mut self) {
        self.cache.unpin(&self.key);
    }
}
