use prometheus::{IntCounter, Opts, Registry};

/// Prometheus metrics collected by the limiter.
///
/// Counters are bumped by the registry layer around each admission decision;
/// the bucket hot path itself stays free of side effects.
#[derive(Debug)]
pub struct LimiterMetrics {
    pub registry: Registry,
    pub allowed_total: IntCounter,
    pub denied_total: IntCounter,
    pub buckets_created: IntCounter,
    pub buckets_evicted: IntCounter,
}

impl LimiterMetrics {
    /// Create a new LimiterMetrics instance with all counters registered
    /// against a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let allowed_total = IntCounter::with_opts(Opts::new(
            "ratewarden_allowed_total",
            "Total number of requests admitted",
        ))
        .expect("failed to create allowed_total counter");

        let denied_total = IntCounter::with_opts(Opts::new(
            "ratewarden_denied_total",
            "Total number of requests denied by rate limiting",
        ))
        .expect("failed to create denied_total counter");

        let buckets_created = IntCounter::with_opts(Opts::new(
            "ratewarden_buckets_created",
            "Total number of per-key buckets created",
        ))
        .expect("failed to create buckets_created counter");

        let buckets_evicted = IntCounter::with_opts(Opts::new(
            "ratewarden_buckets_evicted",
            "Total number of stale buckets evicted",
        ))
        .expect("failed to create buckets_evicted counter");

        registry
            .register(Box::new(allowed_total.clone()))
            .expect("failed to register allowed_total");
        registry
            .register(Box::new(denied_total.clone()))
            .expect("failed to register denied_total");
        registry
            .register(Box::new(buckets_created.clone()))
            .expect("failed to register buckets_created");
        registry
            .register(Box::new(buckets_evicted.clone()))
            .expect("failed to register buckets_evicted");

        Self {
            registry,
            allowed_total,
            denied_total,
            buckets_created,
            buckets_evicted,
        }
    }
}

impl Default for LimiterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
