use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use ratewarden_common::{BucketParams, WardenResult};

use crate::bucket::TokenBucket;
use crate::metrics::LimiterMetrics;

/// Maps opaque keys to their token buckets, creating buckets lazily on first
/// use.
///
/// The map is a [`DashMap`], so lookups and creations for different keys
/// never contend on a registry-wide lock; at most one bucket ever exists per
/// key, and racing first-time callers all end up on the same canonical
/// bucket. Values are `Arc`s so the shard guard is released before the
/// bucket's own mutex is taken.
#[derive(Debug)]
pub struct BucketRegistry {
    buckets: DashMap<String, Arc<TokenBucket>>,
    default_params: BucketParams,
    metrics: LimiterMetrics,
}

impl BucketRegistry {
    /// Create a registry, validating the default parameters eagerly so
    /// `allow` can never hit a configuration error at request time.
    pub fn new(default_params: BucketParams) -> WardenResult<Self> {
        default_params.validate()?;
        Ok(Self {
            buckets: DashMap::new(),
            default_params,
            metrics: LimiterMetrics::new(),
        })
    }

    /// Check whether a request identified by `key` is allowed, using the
    /// registry's default parameters for a first-time key.
    ///
    /// Returns `true` if the request may proceed, `false` if the caller
    /// should be rate-limited.
    pub fn allow(&self, key: &str) -> bool {
        let bucket = self
            .bucket_for(key, &self.default_params)
            .expect("default parameters are validated at construction");
        self.record(bucket.try_consume())
    }

    /// Like [`allow`](Self::allow), but with explicit parameters for the
    /// key's bucket.
    ///
    /// The parameters only take effect if no bucket exists for `key` yet;
    /// configuration is fixed at first creation, and later calls with a
    /// differing config use the existing bucket unchanged. An invalid config
    /// for a genuinely new key fails fast and creates nothing.
    pub fn allow_with(&self, key: &str, params: &BucketParams) -> WardenResult<bool> {
        let bucket = self.bucket_for(key, params)?;
        Ok(self.record(bucket.try_consume()))
    }

    fn bucket_for(&self, key: &str, params: &BucketParams) -> WardenResult<Arc<TokenBucket>> {
        // Fast path: steady-state traffic takes a brief shard read lock to
        // clone the handle, nothing more.
        if let Some(bucket) = self.buckets.get(key) {
            return Ok(Arc::clone(&bucket));
        }

        // The entry API serializes racing first-time callers on this key's
        // shard; exactly one of them constructs the bucket.
        match self.buckets.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let bucket = Arc::new(TokenBucket::new(params)?);
                entry.insert(Arc::clone(&bucket));
                self.metrics.buckets_created.inc();
                tracing::debug!(
                    key,
                    capacity = params.capacity,
                    rate = params.refill_rate_per_sec,
                    "created bucket"
                );
                Ok(bucket)
            }
        }
    }

    /// Create (or fetch) the bucket for `key` without consuming a token.
    ///
    /// Used to pre-register keys with non-default parameters, e.g. from a
    /// configuration file, before any traffic arrives.
    pub fn register_key(&self, key: &str, params: &BucketParams) -> WardenResult<()> {
        self.bucket_for(key, params).map(|_| ())
    }

    fn record(&self, allowed: bool) -> bool {
        if allowed {
            self.metrics.allowed_total.inc();
        } else {
            self.metrics.denied_total.inc();
        }
        allowed
    }

    /// Remove buckets whose last refill is older than `stale_after`.
    ///
    /// Returns the number of buckets evicted. Should be called periodically
    /// to keep one-off keys from growing the map without bound.
    pub fn evict_stale(&self, stale_after: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();

        self.buckets
            .retain(|_key, bucket| now.duration_since(bucket.last_refill()) < stale_after);

        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            self.metrics.buckets_evicted.inc_by(evicted as u64);
        }
        tracing::debug!(
            evicted,
            remaining = self.buckets.len(),
            "stale bucket eviction complete"
        );
        evicted
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn metrics(&self) -> &LimiterMetrics {
        &self.metrics
    }

    pub fn default_params(&self) -> BucketParams {
        self.default_params
    }
}
