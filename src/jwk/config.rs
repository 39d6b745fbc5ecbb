use std::time::Duration;

use super::error::{KeySetError, KeySetResult};

/// Tuning knobs shared by the resolvers and retrievers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverConfig {
    timeout: Duration,
    ttl: Duration,
    max_stale: Duration,
}

impl RetrieverConfig {
    /// Per-request HTTP timeout used when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// How long a fetched key set is served without refetching.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// How long past its TTL a key set may still be served when refreshing
    /// fails.
    pub const DEFAULT_MAX_STALE: Duration = Duration::from_secs(3600);

    /// Creates a configuration with the default values.
    pub fn new() -> RetrieverConfig {
        RetrieverConfig {
            timeout: Self::DEFAULT_TIMEOUT,
            ttl: Self::DEFAULT_TTL,
            max_stale: Self::DEFAULT_MAX_STALE,
        }
    }

    /// Sets the per-request HTTP timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the cache time-to-live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the stale-if-error window. `Duration::ZERO` disables the fallback.
    #[must_use]
    pub fn with_max_stale(mut self, max_stale: Duration) -> Self {
        self.max_stale = max_stale;
        self
    }

    /// Per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cache time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stale-if-error window past the TTL.
    pub fn max_stale(&self) -> Duration {
        self.max_stale
    }

    /// Builds an HTTP client honouring the configured timeout.
    pub fn http_client(&self) -> KeySetResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| KeySetError::transport("", source))
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::new()
    }
}
