use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::RetrieverConfig;
use super::error::{KeySetError, KeySetResult};
use super::resolver::JwksUrlResolver;
use super::retriever::{FromKeySet, JwkRetriever, WebRetriever};

/// Source of the current time for cache freshness decisions.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

struct CacheRecord<T> {
    value: Arc<T>,
    retrieved_at: SystemTime,
}

struct CacheState<T> {
    record: Option<CacheRecord<T>>,
    // Outcome of the latest attempt, if it failed.
    failure: Option<KeySetError>,
}

/// Caches the result of an inner retriever for a time-to-live.
///
/// While the cached value is younger than the TTL it is returned without a
/// fetch. Once it has expired the next call refreshes it through the inner
/// retriever. Concurrent callers share one in-flight refresh: the state
/// stays locked until the refresh completes, and callers that waited on it
/// take its outcome instead of fetching again.
///
/// A failed refresh does not discard the previous value. If it expired less
/// than `max_stale` ago it is still served (and the failure logged);
/// otherwise the inner error is returned and the next call tries again. A
/// failed first fetch leaves the cache empty.
pub struct CachingRetriever<R: JwkRetriever> {
    inner: R,
    ttl: Duration,
    max_stale: Duration,
    clock: Arc<dyn Clock>,
    attempts: AtomicU64,
    state: Mutex<CacheState<R::Output>>,
}

impl<T: FromKeySet> CachingRetriever<WebRetriever<T>> {
    /// Caches a [`WebRetriever`] built from `config`.
    pub fn new(config: &RetrieverConfig) -> KeySetResult<Self> {
        Ok(Self::wrap(WebRetriever::new(config)?, config))
    }
}

impl<R: JwkRetriever> CachingRetriever<R> {
    /// Caches `inner` with the TTL and stale window of `config`.
    pub fn wrap(inner: R, config: &RetrieverConfig) -> Self {
        CachingRetriever {
            inner,
            ttl: config.ttl(),
            max_stale: config.max_stale(),
            clock: Arc::new(SystemClock),
            attempts: AtomicU64::new(0),
            state: Mutex::new(CacheState {
                record: None,
                failure: None,
            }),
        }
    }

    /// Replaces the clock used for freshness decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// How long a fetched value is served without refetching.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The wrapped retriever.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// When the cached value was fetched, or `None` if nothing is cached.
    pub async fn retrieved_at(&self) -> Option<SystemTime> {
        let state = self.state.lock().await;
        state.record.as_ref().map(|record| record.retrieved_at)
    }

    /// Drops the cached value so that the next call fetches.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.record = None;
        state.failure = None;
    }

    // A clock that went backwards counts as age zero.
    fn age(&self, retrieved_at: SystemTime) -> Duration {
        self.clock
            .now()
            .duration_since(retrieved_at)
            .unwrap_or(Duration::ZERO)
    }

    fn fall_back(
        &self,
        state: &CacheState<R::Output>,
        err: KeySetError,
    ) -> KeySetResult<Arc<R::Output>> {
        let ceiling = self.ttl.saturating_add(self.max_stale);
        match state.record.as_ref() {
            Some(cached) if self.age(cached.retrieved_at) < ceiling => {
                warn!(
                    error = %err,
                    "Failed to refresh JWKS, serving stale keys"
                );
                Ok(Arc::clone(&cached.value))
            }
            _ => Err(err),
        }
    }
}

#[async_trait]
impl<R: JwkRetriever> JwkRetriever for CachingRetriever<R> {
    type Output = R::Output;

    async fn retrieve(
        &self,
        resolver: &dyn JwksUrlResolver,
    ) -> KeySetResult<Arc<R::Output>> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if let Some(cached) = state.record.as_ref() {
            if self.age(cached.retrieved_at) < self.ttl {
                debug!("JWKS cache hit");
                return Ok(Arc::clone(&cached.value));
            }
        }

        // A refresh completed while this call waited for the lock.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = state.failure.clone() {
                debug!("Sharing outcome of failed JWKS refresh");
                return self.fall_back(&state, err);
            }
        }

        debug!("JWKS cache empty or expired, refreshing");
        let outcome = self.inner.retrieve(resolver).await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(value) => {
                state.record = Some(CacheRecord {
                    value: Arc::clone(&value),
                    retrieved_at: self.clock.now(),
                });
                state.failure = None;
                Ok(value)
            }
            Err(err) => {
                state.failure = Some(err.clone());
                self.fall_back(&state, err)
            }
        }
    }
}
