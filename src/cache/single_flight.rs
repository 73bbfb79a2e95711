//! TTL cache with single-flight fetches.
//!
//! [`SingleFlightCache`] is the primitive behind the plate-list and
//! thumbnail caches. For any key there is at most one fetch in progress;
//! concurrent callers share it through a [`Shared`] future.
//!
//! # Architecture
//!
//! - Entries live in a moka cache with a per-entry [`Expiry`] policy: the
//!   entry's `placeholder` flag picks between the fresh TTL and the
//!   placeholder TTL. Stale entries are never returned and are evicted
//!   lazily.
//! - In-flight fetches live in a mutex-guarded map, tagged with a
//!   generation number. A finishing fetch stores its result only if its
//!   generation is still the registered one for the key; the check and the
//!   store happen under the same lock. A slow fetch that was superseded by
//!   a forced refresh can therefore never overwrite the newer result.
//! - Fetches run as spawned tasks. A caller that stops waiting does not
//!   cancel the fetch, and its result still lands in the cache.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use moka::Expiry;
use moka::sync::Cache;
use tracing::debug;

use crate::Result;
use crate::telemetry;

/// Time-to-live policy for a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// TTL for regular entries.
    pub fresh: Duration,
    /// TTL for entries flagged as placeholders.
    pub placeholder: Duration,
}

impl TtlPolicy {
    /// Same TTL for every entry.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            fresh: ttl,
            placeholder: ttl,
        }
    }

    /// Separate TTLs for real values and placeholders.
    pub fn two_tier(fresh: Duration, placeholder: Duration) -> Self {
        Self { fresh, placeholder }
    }

    /// TTL that applies to an entry with the given placeholder flag.
    pub fn ttl_for(&self, placeholder: bool) -> Duration {
        if placeholder {
            self.placeholder
        } else {
            self.fresh
        }
    }
}

/// A stored value with its creation instant.
///
/// An entry is valid while `now - created_at < ttl(placeholder)`. The moka
/// store enforces this through its expiry policy; expired entries are never
/// returned.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub placeholder: bool,
}

impl<V> CacheEntry<V> {
    fn new(value: V, placeholder: bool) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            placeholder,
        }
    }
}

/// Value produced by a fetch function.
#[derive(Debug, Clone)]
pub struct Fetched<V> {
    pub value: V,
    pub placeholder: bool,
}

impl<V> Fetched<V> {
    /// A real value, cached with the fresh TTL.
    pub fn value(value: V) -> Self {
        Self {
            value,
            placeholder: false,
        }
    }

    /// A stand-in value, cached with the placeholder TTL.
    pub fn placeholder(value: V) -> Self {
        Self {
            value,
            placeholder: true,
        }
    }
}

struct EntryExpiry {
    policy: TtlPolicy,
}

impl<K, V> Expiry<K, CacheEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &K,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.policy.ttl_for(value.placeholder))
    }

    fn expire_after_update(
        &self,
        _key: &K,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.policy.ttl_for(value.placeholder))
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, Result<CacheEntry<V>>>>;

struct InFlight<V> {
    generation: u64,
    future: SharedFetch<V>,
}

struct Inner<K, V> {
    name: &'static str,
    policy: TtlPolicy,
    entries: Cache<K, CacheEntry<V>>,
    in_flight: Mutex<HashMap<K, InFlight<V>>>,
    next_generation: AtomicU64,
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<K, InFlight<V>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a finished fetch. Stores the result only if `generation` is
    /// still the registered in-flight fetch for `key`.
    fn complete(&self, key: &K, generation: u64, result: &Result<CacheEntry<V>>) {
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::CACHE_FETCHES_TOTAL, "cache" => self.name, "status" => status)
            .increment(1);

        let mut in_flight = self.lock_in_flight();
        let current = in_flight
            .get(key)
            .is_some_and(|f| f.generation == generation);
        if !current {
            debug!(cache = self.name, generation, "superseded fetch finished, result dropped");
            return;
        }
        in_flight.remove(key);
        if let Ok(entry) = result {
            self.entries.insert(key.clone(), entry.clone());
        }
    }
}

/// Generic TTL cache with single-flight fetch semantics.
///
/// Cheap to clone; clones share the same storage.
pub struct SingleFlightCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for SingleFlightCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache. `name` labels log lines and metrics.
    pub fn new(name: &'static str, policy: TtlPolicy, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry { policy })
            .build();
        Self {
            inner: Arc::new(Inner {
                name,
                policy,
                entries,
                in_flight: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn policy(&self) -> TtlPolicy {
        self.inner.policy
    }

    /// Get the value for `key`, fetching it if needed.
    ///
    /// - A fresh entry is returned without calling `fetch` (unless
    ///   `force_refresh`).
    /// - If a fetch for `key` is already running, its result is awaited and
    ///   returned; `fetch` is not called.
    /// - Otherwise `fetch` is started, registered as in flight, and its
    ///   result is stored on success.
    ///
    /// `force_refresh` drops the stored entry before starting a new fetch
    /// that supersedes any fetch already running for `key`.
    ///
    /// Failures are returned to every waiter and never cached.
    pub async fn get<F, Fut>(&self, key: K, force_refresh: bool, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched<V>>> + Send + 'static,
    {
        let name = self.inner.name;
        let pending = {
            let mut in_flight = self.inner.lock_in_flight();

            let joined = if force_refresh {
                self.inner.entries.invalidate(&key);
                None
            } else if let Some(entry) = self.inner.entries.get(&key) {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => name).increment(1);
                return Ok(entry.value);
            } else {
                in_flight.get(&key).map(|f| f.future.clone())
            };

            match joined {
                Some(future) => {
                    drop(fetch);
                    metrics::counter!(telemetry::CACHE_COALESCED_TOTAL, "cache" => name)
                        .increment(1);
                    future
                }
                None => {
                    metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => name).increment(1);
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = name, generation, force_refresh, "starting fetch");
                    let future = self.spawn_fetch(key.clone(), generation, fetch());
                    in_flight.insert(
                        key,
                        InFlight {
                            generation,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        pending.await.map(|entry| entry.value)
    }

    fn spawn_fetch<Fut>(&self, key: K, generation: u64, fetch: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<Fetched<V>>> + Send + 'static,
    {
        let owner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = fetch
                .await
                .map(|fetched| CacheEntry::new(fetched.value, fetched.placeholder));
            owner.complete(&key, generation, &result);
            result
        });
        async move { handle.await? }.boxed().shared()
    }

    /// Fresh value for `key`, without fetching.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.entries.get(key).map(|entry| entry.value)
    }

    /// Store a value directly, bypassing the fetch machinery.
    pub fn insert(&self, key: K, fetched: Fetched<V>) {
        self.inner
            .entries
            .insert(key, CacheEntry::new(fetched.value, fetched.placeholder));
    }

    /// Drop the entry for `key` and forget any fetch in flight for it.
    ///
    /// Callers already waiting on that fetch still receive its result, but
    /// the result is not stored.
    pub fn invalidate(&self, key: &K) {
        let mut in_flight = self.inner.lock_in_flight();
        in_flight.remove(key);
        self.inner.entries.invalidate(key);
    }

    /// Drop every entry and forget every fetch in flight.
    pub fn invalidate_all(&self) {
        let mut in_flight = self.inner.lock_in_flight();
        in_flight.clear();
        self.inner.entries.invalidate_all();
    }

    /// Number of fetches currently registered as in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock_in_flight().len()
    }
}
