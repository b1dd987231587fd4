use std::sync::Mutex;
use std::time::Instant;

use ratewarden_common::{BucketParams, WardenResult};

/// The mutable half of a bucket, guarded as a pair.
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket for a single key.
///
/// Holds up to `capacity` tokens and regenerates them at
/// `refill_rate_per_sec`. Each admitted request consumes exactly one token.
/// Token arithmetic is `f64` so slow rates accrue fractionally (at 0.5
/// tokens/sec a drained bucket becomes consumable after two idle seconds).
///
/// The `(tokens, last_refill)` pair is only ever read or written under the
/// bucket's own mutex, so concurrent callers on the same key serialize here
/// and nowhere else.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket, validating the parameters first.
    ///
    /// A new bucket starts full so a key's first burst is not penalized.
    /// Fails with a configuration error on a zero capacity or a refill rate
    /// that is not positive and finite; `try_consume` itself never fails.
    pub fn new(params: &BucketParams) -> WardenResult<Self> {
        params.validate()?;
        Ok(Self::from_validated(params))
    }

    fn from_validated(params: &BucketParams) -> Self {
        Self {
            capacity: f64::from(params.capacity),
            refill_rate: params.refill_rate_per_sec,
            state: Mutex::new(BucketState {
                tokens: f64::from(params.capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill for the elapsed wall-clock time, then try to consume one token.
    ///
    /// Returns `true` if a token was available and consumed, `false` if the
    /// caller should be rate-limited. Denial is an expected outcome, not an
    /// error, and consumes nothing.
    pub fn try_consume(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().expect("bucket state lock poisoned");

        // Refill tokens for the time elapsed since the last real refill. A
        // zero-token refill (two calls within one clock tick) leaves the
        // timestamp anchored to the last refill that actually added tokens,
        // so fractional accrual is never discarded.
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refill = elapsed * self.refill_rate;
        if refill > 0.0 {
            state.tokens = (state.tokens + refill).min(self.capacity);
            state.last_refill = now;
        }

        // A fractional balance below one token is not spendable.
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Timestamp of the last refill that added tokens (or bucket creation).
    /// Used by the registry to find stale buckets.
    pub(crate) fn last_refill(&self) -> Instant {
        self.state
            .lock()
            .expect("bucket state lock poisoned")
            .last_refill
    }

    #[cfg(test)]
    fn available(&self) -> f64 {
        self.state.lock().unwrap().tokens
    }
}
