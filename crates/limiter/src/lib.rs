//! Keyed admission control for request traffic.
//!
//! Every request is attributed to some key (a user id, API token, client
//! IP) and checked against that key's token bucket: the bucket holds up to
//! `capacity` tokens, refills continuously at `refill_rate_per_sec`, and
//! each admitted request spends one token. The decision is O(1), purely
//! in-memory, and advisory; the caller enforces it, typically by answering
//! "too many requests".
//!
//! The crate is layered bottom-up:
//!
//! - [`TokenBucket`] -- the per-key leaf, owning its own synchronization.
//! - [`BucketRegistry`] -- a concurrent key-to-bucket map with lazy,
//!   race-free creation and optional stale-bucket eviction.
//! - [`RateLimiter`] -- the externally consumed facade. Cheaply cloneable
//!   (backed by `Arc`) and safe to share across threads and tasks.
//!
//! Denial is a first-class outcome carried as a plain `false`; the only
//! error this crate produces is a configuration error at bucket-creation
//! time.

pub mod bucket;
pub mod metrics;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

pub use bucket::TokenBucket;
pub use metrics::LimiterMetrics;
pub use registry::BucketRegistry;

pub use ratewarden_common::{
    BucketParams, EvictionConfig, RateLimitConfig, WardenError, WardenResult,
};

/// The primary public interface of the crate.
///
/// Construct it once at the composition root and call
/// [`check`](RateLimiter::check) on every incoming request. Clones share the
/// same underlying registry.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<BucketRegistry>,
}

impl RateLimiter {
    /// Create a rate limiter whose first-time keys get `default_params`.
    ///
    /// Fails with a configuration error on a zero capacity or a refill rate
    /// that is not positive and finite.
    pub fn new(default_params: BucketParams) -> WardenResult<Self> {
        let registry = BucketRegistry::new(default_params)?;
        tracing::info!(
            capacity = default_params.capacity,
            rate = default_params.refill_rate_per_sec,
            "creating token bucket rate limiter"
        );
        Ok(Self {
            inner: Arc::new(registry),
        })
    }

    /// Build a rate limiter from a validated [`RateLimitConfig`].
    ///
    /// Per-key overrides are pre-registered so their buckets carry the
    /// configured parameters from the first request on. If the config
    /// enables eviction, the background eviction task is started as well.
    pub fn from_config(config: &RateLimitConfig) -> WardenResult<Self> {
        config.validate()?;

        let limiter = Self::new(config.default_params())?;
        for (key, params) in &config.overrides {
            limiter.inner.register_key(key, params)?;
        }

        if config.eviction.enabled {
            limiter.start_eviction_task(
                Duration::from_secs(config.eviction.interval_secs),
                Duration::from_secs(config.eviction.stale_after_secs),
            );
        }

        Ok(limiter)
    }

    /// Check whether a request identified by `key` is allowed.
    ///
    /// Returns `true` if the request is permitted, `false` if the caller has
    /// exceeded the rate limit and should receive a 429 response.
    pub fn check(&self, key: &str) -> bool {
        self.inner.allow(key)
    }

    /// Check a request with explicit bucket parameters for `key`.
    ///
    /// The parameters only matter on the key's first request; see
    /// [`BucketRegistry::allow_with`].
    pub fn check_with(&self, key: &str, params: &BucketParams) -> WardenResult<bool> {
        self.inner.allow_with(key, params)
    }

    /// Access the underlying registry, e.g. for metrics scraping or manual
    /// eviction sweeps.
    pub fn registry(&self) -> &BucketRegistry {
        &self.inner
    }

    /// Spawn a background thread that periodically evicts stale buckets.
    ///
    /// The task runs every `interval` and removes buckets idle for longer
    /// than `stale_after`. It holds a reference to the registry, so the
    /// registry stays alive as long as the task is running.
    pub fn start_eviction_task(&self, interval: Duration, stale_after: Duration) {
        let inner = Arc::clone(&self.inner);

        std::thread::Builder::new()
            .name("ratewarden-eviction".into())
            .spawn(move || loop {
                std::thread::sleep(interval);
                inner.evict_stale(stale_after);
                tracing::trace!("eviction tick completed");
            })
            .expect("failed to spawn eviction thread");
    }
}
