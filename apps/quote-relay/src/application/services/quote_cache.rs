//! Quote Cache
//!
//! Short-lived cache in front of the upstream quote fetcher. Identical
//! requests inside the TTL window collapse onto a single upstream call.
//!
//! # Invariants
//!
//! - An entry is never returned past its expiry; there is no
//!   stale-while-revalidate.
//! - Failed fetches are never cached.
//! - Entries are replaced whole, never partially updated.
//!
//! Two concurrent misses for the same key may both reach the fetcher. Both
//! results are valid and the later write wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::application::ports::{QuoteFetcherPort, UpstreamError};
use crate::domain::quote::{CacheKeyPolicy, QuoteBatch, QuoteRequest, empty_batch};
use crate::infrastructure::metrics;

/// Default number of cached symbol sets.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Lifetime used when `now + ttl` is not representable.
const NEVER_EXPIRES: Duration = Duration::from_secs(30 * 365 * 86_400);

// =============================================================================
// Configuration
// =============================================================================

/// Cache tuning, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy)]
pub struct QuoteCacheConfig {
    /// How long an entry stays fresh.
    pub ttl: Duration,
    /// Maximum number of entries (0 = unbounded).
    pub capacity: usize,
    /// How symbol lists map onto cache keys.
    pub key_policy: CacheKeyPolicy,
}

impl Default for QuoteCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(8),
            capacity: DEFAULT_CACHE_CAPACITY,
            key_policy: CacheKeyPolicy::Ordered,
        }
    }
}

// =============================================================================
// Upstream State Tracking
// =============================================================================

/// Outcome history of upstream calls, reported by the health endpoint.
#[derive(Debug, Default)]
pub struct UpstreamState {
    last_success_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<(DateTime<Utc>, String)>>,
    consecutive_failures: AtomicU32,
}

impl UpstreamState {
    fn record_success(&self) {
        *self.last_success_at.write() = Some(Utc::now());
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self, error: &UpstreamError) {
        *self.last_error.write() = Some((Utc::now(), error.to_string()));
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Time of the last successful upstream call.
    #[must_use]
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        *self.last_success_at.read()
    }

    /// Time and message of the last failed upstream call.
    #[must_use]
    pub fn last_error(&self) -> Option<(DateTime<Utc>, String)> {
        self.last_error.read().clone()
    }

    /// Failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug)]
struct CacheEntry {
    value: QuoteBatch,
    expires_at: Instant,
    last_access: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    access_clock: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.access_clock += 1;
        self.access_clock
    }

    /// Evict until within capacity. Returns the number of evicted entries.
    fn enforce_capacity(&mut self, capacity: usize, now: Instant) -> usize {
        if capacity == 0 || self.entries.len() <= capacity {
            return 0;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);

        while self.entries.len() > capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
        }

        before - self.entries.len()
    }
}

/// TTL cache of quote batches keyed by requested symbol list.
pub struct QuoteCache {
    fetcher: Arc<dyn QuoteFetcherPort>,
    config: QuoteCacheConfig,
    state: Mutex<CacheState>,
    upstream: UpstreamState,
}

impl std::fmt::Debug for QuoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl QuoteCache {
    /// Create a cache in front of the given fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn QuoteFetcherPort>, config: QuoteCacheConfig) -> Self {
        Self {
            fetcher,
            config,
            state: Mutex::new(CacheState::default()),
            upstream: UpstreamState::default(),
        }
    }

    /// Cache configuration.
    #[must_use]
    pub const fn config(&self) -> &QuoteCacheConfig {
        &self.config
    }

    /// Upstream call history.
    #[must_use]
    pub const fn upstream(&self) -> &UpstreamState {
        &self.upstream
    }

    /// Number of stored entries, including any not yet pruned after expiry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the live entry for this request, fetching and storing on miss.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's `UpstreamError` on a miss that fails. Nothing is
    /// cached in that case.
    pub async fn get_or_fetch(&self, request: &QuoteRequest) -> Result<QuoteBatch, UpstreamError> {
        let request = request.normalized(self.config.key_policy);
        let key = request.joined();

        if let Some(batch) = self.lookup(&key) {
            metrics::record_cache_hit();
            tracing::debug!(key = %key, "Cache hit");
            return Ok(batch);
        }

        metrics::record_cache_miss();
        tracing::info!(key = %key, "Fetching quotes from upstream");

        metrics::record_upstream_request();
        let started = Instant::now();
        let result = self.fetcher.fetch(request.symbols()).await;
        metrics::record_upstream_duration(started.elapsed());

        match result {
            Ok(quotes) => {
                self.upstream.record_success();
                let batch: QuoteBatch = quotes.into();
                self.store(key, Arc::clone(&batch));
                Ok(batch)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Upstream quote fetch failed");
                self.upstream.record_failure(&e);
                metrics::record_upstream_error(e.kind());
                Err(e)
            }
        }
    }

    /// Like [`QuoteCache::get_or_fetch`] but absorbs upstream failures into an
    /// empty batch.
    pub async fn get_or_empty(&self, request: &QuoteRequest) -> QuoteBatch {
        match self.get_or_fetch(request).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::debug!(key = %request, error = %e, "Serving empty batch");
                empty_batch()
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<QuoteBatch> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let tick = state.next_tick();

        let fresh = state.entries.get(key).map(|entry| entry.expires_at > now)?;
        if !fresh {
            state.entries.remove(key);
            return None;
        }

        let entry = state.entries.get_mut(key)?;
        entry.last_access = tick;
        Some(Arc::clone(&entry.value))
    }

    fn store(&self, key: String, value: QuoteBatch) {
        let now = Instant::now();
        let evicted = {
            let mut state = self.state.lock();
            let tick = state.next_tick();
            state.entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: now
                        .checked_add(self.config.ttl)
                        .unwrap_or_else(|| now + NEVER_EXPIRES),
                    last_access: tick,
                },
            );
            state.enforce_capacity(self.config.capacity, now)
        };

        if evicted > 0 {
            metrics::record_cache_evictions(evicted as u64);
            tracing::debug!(evicted, "Evicted cache entries");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
