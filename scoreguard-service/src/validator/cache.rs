//! Compiled validator cache
//!
//! Caches compiled validators so repeated validations of the same record
//! kind skip recompilation. The cache is bounded: when an insertion would
//! push occupancy past the configured maximum, the bottom quartile ranked
//! by last use is evicted, oldest first. Staleness is checked lazily on
//! access; an entry unused for longer than the TTL is recompiled in place.

use super::compiled::CompiledValidator;
use parking_lot::RwLock;
use scoreguard_core::config::CacheConfig;
use scoreguard_core::types::RecordKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Revision of the compiled record schemas; part of every cache key
const SCHEMA_REVISION: u32 = 1;

/// Cache key for compiled validators
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCacheKey {
    /// Record kind the validator checks
    pub kind: RecordKind,
    /// Schema revision the validator was compiled against
    pub revision: u32,
}

impl ValidatorCacheKey {
    /// Create a cache key for a record kind at the current schema revision
    #[must_use]
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            revision: SCHEMA_REVISION,
        }
    }
}

impl std::fmt::Display for ValidatorCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@r{}", self.kind, self.revision)
    }
}

/// One resident cache entry
struct CacheEntry {
    compiled: Arc<CompiledValidator>,
    created_at: Instant,
    last_used_at: Instant,
    hits: u64,
}

/// Statistics for cache performance, exposed read-only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,
    /// Total number of cache misses
    pub misses: u64,
    /// Distinct insertions (misses plus stale recompiles)
    pub insertions: u64,
    /// Entries removed by the LRU sweep
    pub evictions: u64,
    /// Entries recompiled in place after exceeding the TTL
    pub stale_recompiles: u64,
    /// Number of validators currently resident
    pub cached_validators: usize,
}

impl CacheStats {
    /// Cache hit rate: hits over hits plus distinct insertions
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let denominator = self.hits + self.insertions;
        if denominator == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                self.hits as f64 / denominator as f64
            }
        }
    }
}

/// Result of one cache lookup
pub struct CacheLookup {
    /// The compiled validator, freshly compiled or from cache
    pub validator: Arc<CompiledValidator>,
    /// Whether the lookup was served from a live cached entry
    pub from_cache: bool,
}

/// Bounded cache of compiled validators with LRU eviction and lazy TTL
pub struct CompiledValidatorCache {
    entries: RwLock<HashMap<ValidatorCacheKey, CacheEntry>>,
    stats: RwLock<CacheStats>,
    max_validators: usize,
    ttl: Duration,
}

impl Default for CompiledValidatorCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl CompiledValidatorCache {
    /// Create a cache from configuration
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_validators, config.ttl)
    }

    /// Create a cache with explicit limits
    #[must_use]
    pub fn with_limits(max_validators: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            max_validators: max_validators.max(1),
            ttl,
        }
    }

    /// Get the compiled validator for a kind, compiling on miss
    ///
    /// A hit refreshes the entry's last-used timestamp and hit counter. An
    /// entry unused for longer than the TTL is recompiled in place and
    /// counted as a stale recompile rather than a hit. Timestamp races
    /// between concurrent callers only affect eviction ordering.
    pub fn get_or_compile(&self, kind: RecordKind) -> CacheLookup {
        let key = ValidatorCacheKey::new(kind);
        let now = Instant::now();

        {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(&key) {
                if now.duration_since(entry.last_used_at) > self.ttl {
                    // Stale: recompile in place, keep the slot
                    entry.compiled = Arc::new(CompiledValidator::compile(kind));
                    entry.created_at = now;
                    entry.last_used_at = now;

                    let mut stats = self.stats.write();
                    stats.stale_recompiles += 1;
                    stats.insertions += 1;
                    tracing::debug!(key = %key, "recompiled stale validator");

                    return CacheLookup {
                        validator: Arc::clone(&entry.compiled),
                        from_cache: false,
                    };
                }

                entry.last_used_at = now;
                entry.hits += 1;
                self.stats.write().hits += 1;

                return CacheLookup {
                    validator: Arc::clone(&entry.compiled),
                    from_cache: true,
                };
            }
        }

        // Miss: compile outside the lock, then insert
        let compiled = Arc::new(CompiledValidator::compile(kind));

        let mut entries = self.entries.write();
        let mut stats = self.stats.write();
        stats.misses += 1;

        if !entries.contains_key(&key) && entries.len() >= self.max_validators {
            let evicted = Self::evict_quartile(&mut entries);
            stats.evictions += evicted;
        }

        // A concurrent caller may have inserted while we compiled; keep
        // whichever entry landed first
        let validator = {
            let entry = entries.entry(key).or_insert_with(|| CacheEntry {
                compiled: Arc::clone(&compiled),
                created_at: now,
                last_used_at: now,
                hits: 0,
            });
            entry.last_used_at = now;
            Arc::clone(&entry.compiled)
        };
        stats.insertions += 1;
        stats.cached_validators = entries.len();

        CacheLookup {
            validator,
            from_cache: false,
        }
    }

    /// Evict the bottom quartile ranked by last use, oldest first
    fn evict_quartile(entries: &mut HashMap<ValidatorCacheKey, CacheEntry>) -> u64 {
        let count = (entries.len() / 4).max(1);

        let mut by_age: Vec<(ValidatorCacheKey, Instant)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.last_used_at))
            .collect();
        by_age.sort_by_key(|(_, last_used_at)| *last_used_at);

        let mut evicted = 0;
        for (key, _) in by_age.into_iter().take(count) {
            entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    /// Pre-compile validators for the given kinds
    pub fn warm(&self, kinds: &[RecordKind]) {
        for &kind in kinds {
            let _ = self.get_or_compile(kind);
        }
    }

    /// Number of validators currently resident
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.cached_validators = self.entries.read().len();
        stats
    }

    /// Age of the oldest last-use timestamp, for diagnostics
    #[must_use]
    pub fn oldest_entry_age(&self) -> Option<Duration> {
        let entries = self.entries.read();
        entries
            .values()
            .map(|entry| entry.last_used_at)
            .min()
            .map(|t| t.elapsed())
    }

    /// Time since a kind's validator was compiled, for diagnostics
    #[must_use]
    pub fn entry_age(&self, kind: RecordKind) -> Option<Duration> {
        self.entries
            .read()
            .get(&ValidatorCacheKey::new(kind))
            .map(|entry| entry.created_at.elapsed())
    }

    /// Drop every cached validator and reset occupancy
    pub fn clear(&self) {
        self.entries.write().clear();
        self.stats.write().cached_validators = 0;
    }
}
