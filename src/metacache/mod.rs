//! Metadata cache - TTL read-through cache with single-flight population.
//!
//! A [`MetaCache`] stores flat string-attribute mappings keyed by an opaque
//! string identifier. Population is lazy: [`MetaCache::check_and_update`]
//! fetches via a caller-supplied [`MetaLookup`] only when the key is missing
//! or its entry is older than the TTL. Concurrent refreshes of the same key
//! coalesce into one fetch.
//!
//! Freshness is tracked explicitly per entry rather than delegated to an
//! expiring map: [`MetaCache::retrieve`] deliberately serves stale values,
//! and only `check_and_update` evaluates age.

mod lookup;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, FetchError};

pub use lookup::{AttrMap, LookupParams, MetaLookup};

/// Default bound on a single remote fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One cached attribute mapping.
///
/// Replaced whole on refresh; readers observe either the old value or the
/// new one, never a mix.
#[derive(Debug, Clone)]
struct CacheEntry {
    attrs: AttrMap,
    fetched_at: Instant,
}

/// Concurrency-safe TTL read-through cache.
///
/// Cheap to share via `Arc`; all methods take `&self`.
pub struct MetaCache {
    entries: DashMap<String, CacheEntry>,
    /// Per-key population gates. At most one fetch is in flight per key;
    /// waiters re-check freshness after acquiring the gate and reuse the
    /// winner's entry instead of fetching again.
    inflight: DashMap<String, Arc<Mutex<()>>>,
    ttl: Option<Duration>,
    capacity: usize,
    fetch_timeout: Duration,
}

impl MetaCache {
    /// Create a cache.
    ///
    /// `ttl = None` means entries never expire. `capacity` is an advisory
    /// upper bound on entry count (`0` = unbounded); when inserting a new
    /// key at capacity, the entry with the oldest fetch time is evicted
    /// first, approximating LRU under the read-through access pattern.
    pub fn new(ttl: Option<Duration>, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            ttl,
            capacity,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Set the per-call bound on remote fetches (builder pattern).
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Refresh the entry for `key` if it is missing or stale.
    ///
    /// Fresh entry: no-op, returns immediately without touching the per-key
    /// gate. Missing or stale: invokes the lookup's fetch, bounded by the
    /// fetch timeout, and stores the result with the current instant. On
    /// fetch failure any existing entry is left untouched and
    /// [`Error::FetchFailed`] is returned.
    ///
    /// Concurrent calls for the same stale/missing key coalesce into a
    /// single fetch; every caller returns once that fetch has resolved, and
    /// all of them observe the same entry.
    ///
    /// The fetch may call `check_and_update` on a *different* cache
    /// instance (chained lookup). Gates are per key *and* per instance and
    /// no map guard is held across the fetch, so nested calls cannot
    /// deadlock as long as chains are acyclic.
    pub async fn check_and_update(&self, key: &str, lookup: MetaLookup) -> Result<(), Error> {
        if self.is_fresh(key) {
            return Ok(());
        }

        let gate = {
            let slot = self.inflight.entry(key.to_string()).or_default();
            Arc::clone(&slot)
        };
        let guard = gate.lock().await;

        // Another caller may have populated the key while we waited.
        let outcome = if self.is_fresh(key) {
            Ok(())
        } else {
            self.populate(key, &lookup).await
        };

        drop(guard);
        // Drop the gate once no other caller is waiting on it. Count 2 =
        // the map's clone plus ours.
        self.inflight
            .remove_if(key, |_, slot| Arc::strong_count(slot) <= 2);
        outcome
    }

    /// Return the stored value for `key`, if the key has ever been
    /// successfully populated.
    ///
    /// Never triggers population and never blocks beyond a sharded read
    /// guard. A stale value is still returned: staleness is evaluated only
    /// by [`check_and_update`](Self::check_and_update).
    pub fn retrieve(&self, key: &str) -> Option<AttrMap> {
        self.entries.get(key).map(|entry| entry.attrs.clone())
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => match self.ttl {
                Some(ttl) => entry.fetched_at.elapsed() < ttl,
                None => true,
            },
            None => false,
        }
    }

    /// Run the fetch and store its result. Caller holds the per-key gate.
    async fn populate(&self, key: &str, lookup: &MetaLookup) -> Result<(), Error> {
        debug!(key, params = ?lookup.params(), "populating cache entry");
        let attrs = match tokio::time::timeout(self.fetch_timeout, lookup.invoke()).await {
            Ok(Ok(attrs)) => attrs,
            Ok(Err(source)) => {
                return Err(Error::FetchFailed {
                    key: key.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(Error::FetchFailed {
                    key: key.to_string(),
                    source: FetchError::Timeout(self.fetch_timeout),
                });
            }
        };

        if self.capacity > 0
            && !self.entries.contains_key(key)
            && self.entries.len() >= self.capacity
        {
            self.evict_oldest();
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                attrs,
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Evict the entry with the oldest fetch time.
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().fetched_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            warn!(key = %key, capacity = self.capacity, "cache at capacity, evicted oldest entry");
        }
    }
}

impl std::fmt::Debug for MetaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaCache")
            .field("entry_count", &self.entries.len())
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .finish()
    }
}
