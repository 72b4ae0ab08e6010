//! Read path: serve from cache, refresh then serve, or serve stale on failure.
//!
//! Refreshes are deduplicated per key. The first caller to need a refresh
//! spawns it as a detached task and parks a shared handle in the in-flight
//! table; every caller arriving for the same key before it finishes awaits
//! that same handle. A refresh started on behalf of a reader checks the
//! cache once more before fetching, so a reader whose cache lookup overlapped
//! the end of another refresh picks up that result instead of fetching again.
//! The task writes the cache only after a successful fetch, so a failed or
//! timed-out refresh leaves the previous entry as it was.

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{FetchError, FetchResult, ReadError};
use crate::fetcher::Fetcher;
use crate::freshness::{CacheStatus, FreshnessPolicy};

/// Default bound on a whole refresh (listing plus every enrichment batch)
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

type SharedRefresh<T> = Shared<BoxFuture<'static, FetchResult<CacheEntry<T>>>>;

/// Where a read ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    ServingCache,
    Refreshing,
    ServingFresh,
    ServingStaleOnFailure,
    Failed,
}

impl RefreshState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServingCache => "cache",
            Self::Refreshing => "refreshing",
            Self::ServingFresh => "fresh",
            Self::ServingStaleOnFailure => "stale",
            Self::Failed => "failed",
        }
    }
}

/// Data returned by a read, with how it was obtained
#[derive(Debug, Clone)]
pub struct Served<T> {
    pub data: T,
    pub state: RefreshState,
    pub cached_at: DateTime<Utc>,
}

impl<T> Served<T> {
    fn from_entry(entry: CacheEntry<T>, state: RefreshState) -> Self {
        Self {
            data: entry.data,
            state,
            cached_at: entry.cached_at,
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub policy: FreshnessPolicy,
    /// Upper bound on one refresh; a refresh that overruns is a failure
    pub fetch_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policy: FreshnessPolicy::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_policy(mut self, policy: FreshnessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

struct Inner<F: Fetcher> {
    fetcher: F,
    store: CacheStore<F::Output>,
    config: OrchestratorConfig,
    inflight: Mutex<HashMap<String, SharedRefresh<F::Output>>>,
}

/// Removes the in-flight marker however the refresh task ends
struct InflightGuard<F: Fetcher> {
    inner: Arc<Inner<F>>,
    key: String,
}

impl<F: Fetcher> Drop for InflightGuard<F> {
    fn drop(&mut self) {
        self.inner.inflight.lock().remove(&self.key);
    }
}

/// Freshness-aware read path over one fetcher and one cache store
pub struct RefreshOrchestrator<F: Fetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher> Clone for RefreshOrchestrator<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Fetcher> RefreshOrchestrator<F> {
    pub fn new(fetcher: F, store: CacheStore<F::Output>, config: OrchestratorConfig) -> Self {
        info!(
            "Initializing refresh orchestrator (fetch_timeout={:?})",
            config.fetch_timeout
        );
        Self {
            inner: Arc::new(Inner {
                fetcher,
                store,
                config,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.inner.config.policy
    }

    pub fn store(&self) -> &CacheStore<F::Output> {
        &self.inner.store
    }

    /// Number of refreshes currently running
    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.lock().len()
    }

    /// Serve `key`, refreshing first when the policy says so.
    ///
    /// Fails only when the refresh fails and nothing is cached.
    pub async fn read(&self, key: &str) -> Result<Served<F::Output>, ReadError> {
        self.read_inner(key, None).await
    }

    /// Like [`read`](Self::read), but stop waiting on a refresh after `wait`.
    ///
    /// Giving up counts as a failed refresh for this caller: a cached entry
    /// is served stale, otherwise the read fails. The refresh itself keeps
    /// running and still lands in the cache if it succeeds.
    pub async fn read_with_timeout(
        &self,
        key: &str,
        wait: Duration,
    ) -> Result<Served<F::Output>, ReadError> {
        self.read_inner(key, Some(wait)).await
    }

    /// Refresh `key` unconditionally, joining a refresh already in flight
    pub async fn refresh(&self, key: &str) -> FetchResult<CacheEntry<F::Output>> {
        self.join_or_start(key, false).await
    }

    /// How the policy currently classifies `key`. Never fetches.
    pub async fn status(&self, key: &str) -> CacheStatus {
        let now = self.inner.store.clock().now();
        let cached_at = self.inner.store.peek(key).await.map(|e| e.cached_at);
        self.inner.config.policy.status(cached_at, now)
    }

    async fn read_inner(
        &self,
        key: &str,
        wait: Option<Duration>,
    ) -> Result<Served<F::Output>, ReadError> {
        let now = self.inner.store.clock().now();
        let cached = self.inner.store.get(key).await;

        if let Some(entry) = cached
            .as_ref()
            .filter(|entry| self.inner.config.policy.should_serve_cache(Some(*entry), now))
        {
            debug!(
                "READ key={}, state={}, cached_at={}",
                key,
                RefreshState::ServingCache.as_str(),
                entry.cached_at
            );
            return Ok(Served::from_entry(entry.clone(), RefreshState::ServingCache));
        }

        debug!(
            "READ key={}, state={}, has_entry={}",
            key,
            RefreshState::Refreshing.as_str(),
            cached.is_some()
        );
        let refresh = self.join_or_start(key, true);
        let outcome = match wait {
            Some(wait) => match tokio::time::timeout(wait, refresh).await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::Timeout(wait)),
            },
            None => refresh.await,
        };

        match (outcome, cached) {
            (Ok(fresh), _) => Ok(Served::from_entry(fresh, RefreshState::ServingFresh)),
            (Err(e), Some(stale)) => {
                warn!(
                    "Refresh failed for key={}, state={}, serving data cached at {}: {}",
                    key,
                    RefreshState::ServingStaleOnFailure.as_str(),
                    stale.cached_at,
                    e
                );
                Ok(Served::from_entry(stale, RefreshState::ServingStaleOnFailure))
            }
            (Err(e), None) => {
                error!(
                    "Refresh failed for key={}, state={}, nothing cached: {}",
                    key,
                    RefreshState::Failed.as_str(),
                    e
                );
                Err(ReadError::NoDataAvailable { reason: e })
            }
        }
    }

    /// Join the refresh in flight for `key`, or spawn one. With `recheck`,
    /// the spawned task serves a cache entry that became current meanwhile.
    fn join_or_start(&self, key: &str, recheck: bool) -> SharedRefresh<F::Output> {
        let mut inflight = self.inner.inflight.lock();
        if let Some(existing) = inflight.get(key) {
            debug!("Joining refresh already in flight for key={}", key);
            return existing.clone();
        }

        let guard = InflightGuard {
            inner: self.inner.clone(),
            key: key.to_string(),
        };
        let handle = tokio::spawn(async move {
            let outcome = guard.inner.run_refresh(&guard.key, recheck).await;
            drop(guard);
            outcome
        });

        let refresh: SharedRefresh<F::Output> = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FetchError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        inflight.insert(key.to_string(), refresh.clone());
        refresh
    }
}

impl<F: Fetcher> Inner<F> {
    async fn run_refresh(&self, key: &str, recheck: bool) -> FetchResult<CacheEntry<F::Output>> {
        if recheck {
            let now = self.store.clock().now();
            if let Some(entry) = self
                .store
                .get(key)
                .await
                .filter(|entry| self.config.policy.should_serve_cache(Some(entry), now))
            {
                debug!(
                    "Key={} became current at {}, skipping fetch",
                    key, entry.cached_at
                );
                return Ok(entry);
            }
        }

        info!("Refreshing key={}", key);
        let timeout = self.config.fetch_timeout;

        let data = match tokio::time::timeout(timeout, self.fetcher.fetch()).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                warn!("Fetch failed for key={}: {}", key, e);
                return Err(e);
            }
            Err(_) => {
                warn!("Fetch for key={} timed out after {:?}", key, timeout);
                return Err(FetchError::Timeout(timeout));
            }
        };

        let cached_at = match self.store.set(key, &data).await {
            Some(cached_at) => cached_at,
            // Write lost; the caller still gets the fresh data
            None => self.store.clock().now(),
        };
        info!("Refresh complete for key={}, cached_at={}", key, cached_at);

        Ok(CacheEntry { data, cached_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::freshness::{Clock, ManualClock};
    use crate::testing::FakeFetcher;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, min, 0).unwrap()
    }

    fn setup(
        fetcher: FakeFetcher,
        now: DateTime<Utc>,
    ) -> (RefreshOrchestrator<FakeFetcher>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let store = CacheStore::new(Arc::new(MemoryBackend::new()), clock.clone());
        let orchestrator = RefreshOrchestrator::new(
            fetcher,
            store,
            OrchestratorConfig::default().with_fetch_timeout(Duration::from_secs(5)),
        );
        (orchestrator, clock)
    }

    /// Write an entry as if it had been cached at `cached_at`
    async fn seed(
        orchestrator: &RefreshOrchestrator<FakeFetcher>,
        clock: &ManualClock,
        cached_at: DateTime<Utc>,
        data: Vec<u32>,
    ) {
        let now = clock.now();
        clock.set(cached_at);
        orchestrator.store().set("chart", &data).await.unwrap();
        clock.set(now);
    }

    #[tokio::test]
    async fn test_empty_cache_fetches_and_stores() {
        let fetcher = FakeFetcher::new(vec![1, 2, 3]);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));

        let served = orchestrator.read("chart").await.unwrap();
        assert_eq!(served.data, vec![1, 2, 3]);
        assert_eq!(served.state, RefreshState::ServingFresh);
        assert_eq!(served.cached_at, clock.now());
        assert_eq!(fetcher.calls(), 1);

        let stored = orchestrator.store().get("chart").await.unwrap();
        assert_eq!(stored.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_repeated_reads_of_servable_entry_do_not_fetch() {
        let fetcher = FakeFetcher::new(vec![9]);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));
        seed(&orchestrator, &clock, at(4, 23, 30), vec![1]).await;

        let first = orchestrator.read("chart").await.unwrap();
        let second = orchestrator.read("chart").await.unwrap();

        assert_eq!(first.state, RefreshState::ServingCache);
        assert_eq!(second.state, RefreshState::ServingCache);
        assert_eq!(second.data, vec![1]);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_entry_triggers_refresh() {
        let fetcher = FakeFetcher::new(vec![2]);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));
        seed(&orchestrator, &clock, at(4, 22, 0), vec![1]).await;

        let served = orchestrator.read("chart").await.unwrap();
        assert_eq!(served.state, RefreshState::ServingFresh);
        assert_eq!(served.data, vec![2]);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_valid_but_due_entry_triggers_refresh() {
        let fetcher = FakeFetcher::new(vec![2]);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 23, 30));
        seed(&orchestrator, &clock, at(4, 23, 30), vec![1]).await;

        let served = orchestrator.read("chart").await.unwrap();
        assert_eq!(served.state, RefreshState::ServingFresh);
        assert_eq!(fetcher.calls(), 1);

        // The fresh entry is stamped after the cutover and is now servable
        let again = orchestrator.read("chart").await.unwrap();
        assert_eq!(again.state, RefreshState::ServingCache);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_previous_data_unchanged() {
        let fetcher = FakeFetcher::new(vec![2]);
        fetcher.set_failing(true);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));
        seed(&orchestrator, &clock, at(3, 12, 0), vec![7, 8]).await;

        let served = orchestrator.read("chart").await.unwrap();
        assert_eq!(served.state, RefreshState::ServingStaleOnFailure);
        assert_eq!(served.data, vec![7, 8]);
        assert_eq!(served.cached_at, at(3, 12, 0));

        let stored = orchestrator.store().get("chart").await.unwrap();
        assert_eq!(stored.cached_at, at(3, 12, 0));
    }

    #[tokio::test]
    async fn test_failed_refresh_without_cache_is_no_data() {
        let fetcher = FakeFetcher::new(vec![2]);
        fetcher.set_failing(true);
        let (orchestrator, _clock) = setup(fetcher, at(5, 8, 0));

        let err = orchestrator.read("chart").await.unwrap_err();
        assert!(matches!(
            err,
            ReadError::NoDataAvailable {
                reason: FetchError::SourceUnavailable(_)
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_fetch() {
        let fetcher = FakeFetcher::new(vec![4]).with_delay(Duration::from_secs(1));
        let (orchestrator, _clock) = setup(fetcher.clone(), at(5, 8, 0));

        let (a, b, c) = tokio::join!(
            orchestrator.read("chart"),
            orchestrator.read("chart"),
            orchestrator.refresh("chart"),
        );

        assert_eq!(a.unwrap().data, vec![4]);
        assert_eq!(b.unwrap().data, vec![4]);
        assert_eq!(c.unwrap().data, vec![4]);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(orchestrator.inflight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_refresh_independently() {
        let fetcher = FakeFetcher::new(vec![4]).with_delay(Duration::from_secs(1));
        let (orchestrator, _clock) = setup(fetcher.clone(), at(5, 8, 0));

        let (a, b) = tokio::join!(orchestrator.read("global"), orchestrator.read("us"));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_fetch_leaves_cache_untouched() {
        let fetcher = FakeFetcher::new(vec![2]).with_delay(Duration::from_secs(30));
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));
        seed(&orchestrator, &clock, at(3, 12, 0), vec![1]).await;

        let served = orchestrator.read("chart").await.unwrap();
        assert_eq!(served.state, RefreshState::ServingStaleOnFailure);
        assert_eq!(served.data, vec![1]);

        let stored = orchestrator.store().get("chart").await.unwrap();
        assert_eq!(stored.data, vec![1]);
        assert_eq!(stored.cached_at, at(3, 12, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_does_not_cancel_refresh() {
        let fetcher = FakeFetcher::new(vec![3]).with_delay(Duration::from_secs(2));
        let (orchestrator, _clock) = setup(fetcher.clone(), at(5, 8, 0));

        let err = orchestrator
            .read_with_timeout("chart", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReadError::NoDataAvailable {
                reason: FetchError::Timeout(_)
            }
        ));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let stored = orchestrator.store().get("chart").await.unwrap();
        assert_eq!(stored.data, vec![3]);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_ignores_fresh_cache() {
        let fetcher = FakeFetcher::new(vec![5]);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));
        seed(&orchestrator, &clock, at(5, 7, 0), vec![1]).await;

        let entry = orchestrator.refresh("chart").await.unwrap();
        assert_eq!(entry.data, vec![5]);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_status_never_fetches() {
        let fetcher = FakeFetcher::new(vec![5]);
        let (orchestrator, clock) = setup(fetcher.clone(), at(5, 8, 0));

        let empty = orchestrator.status("chart").await;
        assert!(empty.cached_at.is_none());
        assert!(empty.is_due);

        seed(&orchestrator, &clock, at(4, 23, 30), vec![1]).await;
        let status = orchestrator.status("chart").await;
        assert_eq!(status.cached_at, Some(at(4, 23, 30)));
        assert!(status.is_valid);
        assert!(!status.is_due);
        assert_eq!(fetcher.calls(), 0);
    }
}
