//! Computed value cache using moka
//!
//! Entries are keyed by `(record, field, timestamp)` and stamped with the
//! generation of their `(record, field)` pair at the time resolution
//! started. Invalidation bumps the generation instead of hunting down
//! entries, so a value computed before an invalidation can never be read
//! after it, even when its `put` lands late.

use dashmap::DashMap;
use moka::sync::Cache;
use rollup_model::{FieldId, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache key; `at == None` is the volatile "latest" entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Record owning the computed field
    pub record: RecordId,
    /// Computed field
    pub field: FieldId,
    /// Point in time, `None` for latest
    pub at: Option<Timestamp>,
}

impl CacheKey {
    /// Create key
    #[inline]
    #[must_use]
    pub const fn new(record: RecordId, field: FieldId, at: Option<Timestamp>) -> Self {
        Self { record, field, at }
    }

    /// Key of the latest value
    #[inline]
    #[must_use]
    pub const fn latest(record: RecordId, field: FieldId) -> Self {
        Self::new(record, field, None)
    }

    #[inline]
    fn pair(&self) -> (RecordId, FieldId) {
        (self.record, self.field)
    }
}

/// Validity token taken before a resolution starts
///
/// A value stored with [`ValueCache::put_if_current`] is readable only while
/// no invalidation of its pair happened since the ticket was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket {
    key: CacheKey,
    stamp: Stamp,
}

impl CacheTicket {
    /// Key the ticket was taken for
    #[inline]
    #[must_use]
    pub fn key(&self) -> CacheKey {
        self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    epoch: u64,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    stamp: Stamp,
    value: Option<f64>,
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries in cache (stale ones included until evicted)
    pub entry_count: u64,
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that found nothing readable
    pub misses: u64,
    /// Pair invalidations
    pub invalidations: u64,
    /// Values dropped because their pair was invalidated mid-resolution
    pub stale_puts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    stale_puts: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Concurrent cache of computed values
///
/// Stores resolved values, including the explicit "no value" result:
/// - `get` returns `None` on a miss and `Some(None)` for a cached "no value"
/// - entries are bounded (LRU-style eviction) and optionally expire (TTL)
/// - cloning shares the underlying storage
///
/// Constructed and injected by the hosting application; there is no global
/// instance.
#[derive(Clone)]
pub struct ValueCache {
    inner: Cache<CacheKey, Entry>,
    generations: Arc<DashMap<(RecordId, FieldId), u64>>,
    epoch: Arc<AtomicU64>,
    counters: Arc<Counters>,
}

impl fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCache")
            .field("entry_count", &self.inner.entry_count())
            .field("tracked_pairs", &self.generations.len())
            .finish_non_exhaustive()
    }
}

impl ValueCache {
    /// Create new cache with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self::from_inner(Cache::new(max_capacity))
    }

    /// Create cache with time-based expiration
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self::from_inner(
            Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        )
    }

    fn from_inner(inner: Cache<CacheKey, Entry>) -> Self {
        Self {
            inner,
            generations: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(Counters::default()),
        }
    }

    fn stamp(&self, key: &CacheKey) -> Stamp {
        Stamp {
            epoch: self.epoch.load(Ordering::Acquire),
            generation: self.generations.get(&key.pair()).map_or(0, |g| *g),
        }
    }

    /// Take a validity ticket for `key`
    #[inline]
    #[must_use]
    pub fn ticket(&self, key: CacheKey) -> CacheTicket {
        CacheTicket {
            key,
            stamp: self.stamp(&key),
        }
    }

    /// Cached value for the key
    ///
    /// `None` on a miss, `Some(None)` when "no value" was cached.
    #[must_use]
    pub fn get(&self, record: RecordId, field: FieldId, at: Option<Timestamp>) -> Option<Option<f64>> {
        self.lookup(&CacheKey::new(record, field, at))
    }

    fn lookup(&self, key: &CacheKey) -> Option<Option<f64>> {
        let current = self.stamp(key);
        match self.inner.get(key) {
            Some(entry) if entry.stamp == current => {
                Counters::bump(&self.counters.hits);
                tracing::trace!(record = %key.record, field = %key.field, "cache hit");
                Some(entry.value)
            }
            _ => {
                Counters::bump(&self.counters.misses);
                tracing::trace!(record = %key.record, field = %key.field, "cache miss");
                None
            }
        }
    }

    /// Store a value; last writer wins
    ///
    /// The value is stamped with the current generation. Callers that
    /// resolve concurrently with writers should prefer
    /// [`ValueCache::put_if_current`] or [`ValueCache::get_or_resolve`].
    pub fn put(&self, record: RecordId, field: FieldId, at: Option<Timestamp>, value: Option<f64>) {
        let key = CacheKey::new(record, field, at);
        let stamp = self.stamp(&key);
        self.inner.insert(key, Entry { stamp, value });
    }

    /// Store a value resolved under `ticket`
    ///
    /// Returns `false`, storing nothing, when the pair was invalidated since
    /// the ticket was taken.
    pub fn put_if_current(&self, ticket: CacheTicket, value: Option<f64>) -> bool {
        if self.stamp(&ticket.key) != ticket.stamp {
            Counters::bump(&self.counters.stale_puts);
            tracing::debug!(
                record = %ticket.key.record,
                field = %ticket.key.field,
                "dropping value resolved before invalidation"
            );
            return false;
        }
        // Stamped with the ticket: an invalidation racing this insert still
        // makes the entry unreadable.
        self.inner.insert(
            ticket.key,
            Entry {
                stamp: ticket.stamp,
                value,
            },
        );
        true
    }

    /// Cached value, or resolve once and cache the result
    ///
    /// Errors are returned as is and never cached.
    ///
    /// # Errors
    /// Whatever `resolve` returns.
    pub fn get_or_resolve<E, F>(
        &self,
        record: RecordId,
        field: FieldId,
        at: Option<Timestamp>,
        resolve: F,
    ) -> Result<Option<f64>, E>
    where
        F: FnOnce() -> Result<Option<f64>, E>,
    {
        let key = CacheKey::new(record, field, at);
        let ticket = self.ticket(key);
        if let Some(cached) = self.lookup(&key) {
            return Ok(cached);
        }

        let value = resolve()?;
        self.put_if_current(ticket, value);
        Ok(value)
    }

    /// Make every entry of `(record, field)` unreadable, historical ones included
    pub fn invalidate(&self, record: RecordId, field: FieldId) {
        *self.generations.entry((record, field)).or_insert(0) += 1;
        self.inner.invalidate(&CacheKey::latest(record, field));
        Counters::bump(&self.counters.invalidations);
        tracing::debug!(record = %record, field = %field, "invalidated computed value");
    }

    /// Invalidate all entries
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
        tracing::debug!("invalidated all computed values");
    }

    /// Whether a readable entry exists for the key
    #[must_use]
    pub fn contains(&self, record: RecordId, field: FieldId, at: Option<Timestamp>) -> bool {
        let key = CacheKey::new(record, field, at);
        let current = self.stamp(&key);
        self.inner.get(&key).is_some_and(|entry| entry.stamp == current)
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            stale_puts: self.counters.stale_puts.load(Ordering::Relaxed),
        }
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for ValueCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}
