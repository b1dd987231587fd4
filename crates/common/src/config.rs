use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{WardenError, WardenResult};

/// Refill/capacity parameters for a single token bucket.
///
/// `capacity` bounds the burst a key may spend at once;
/// `refill_rate_per_sec` is the sustained admission rate. Both are fixed at
/// bucket creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketParams {
    pub capacity: u32,
    pub refill_rate_per_sec: f64,
}

impl BucketParams {
    pub fn new(capacity: u32, refill_rate_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_rate_per_sec,
        }
    }

    /// Check that the parameters describe a usable bucket.
    ///
    /// Rejects a zero capacity and any refill rate that is not a positive
    /// finite number. Runs once per bucket creation, never on the request
    /// path.
    pub fn validate(&self) -> WardenResult<()> {
        if self.capacity == 0 {
            return Err(WardenError::Config(
                "bucket capacity must be a positive integer".to_string(),
            ));
        }
        if !self.refill_rate_per_sec.is_finite() || self.refill_rate_per_sec <= 0.0 {
            return Err(WardenError::Config(format!(
                "refill rate must be a positive finite number, got {}",
                self.refill_rate_per_sec
            )));
        }
        Ok(())
    }
}

/// Top-level rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_capacity")]
    pub default_capacity: u32,
    #[serde(default = "default_refill_rate")]
    pub default_refill_rate_per_sec: f64,
    #[serde(default)]
    pub eviction: EvictionConfig,
    /// Per-key parameter overrides, applied when the key's bucket is first
    /// created.
    #[serde(default)]
    pub overrides: HashMap<String, BucketParams>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_capacity: default_capacity(),
            default_refill_rate_per_sec: default_refill_rate(),
            eviction: EvictionConfig::default(),
            overrides: HashMap::new(),
        }
    }
}

/// Settings for the optional stale-bucket eviction task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    #[serde(default = "default_eviction_interval")]
    pub interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stale_after_secs: default_stale_after(),
            interval_secs: default_eviction_interval(),
        }
    }
}

// Default value helpers
fn default_capacity() -> u32 {
    200
}
fn default_refill_rate() -> f64 {
    100.0
}
fn default_stale_after() -> u64 {
    5 * 60
}
fn default_eviction_interval() -> u64 {
    60
}

impl RateLimitConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path, "loaded rate limit configuration");
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> WardenResult<()> {
        self.default_params().validate()?;

        for (key, params) in &self.overrides {
            params
                .validate()
                .map_err(|e| WardenError::Config(format!("override for key '{key}': {e}")))?;
        }

        if self.eviction.enabled {
            if self.eviction.stale_after_secs == 0 {
                return Err(WardenError::Config(
                    "eviction.stale_after_secs must be nonzero when eviction is enabled"
                        .to_string(),
                ));
            }
            if self.eviction.interval_secs == 0 {
                return Err(WardenError::Config(
                    "eviction.interval_secs must be nonzero when eviction is enabled".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The parameters applied to keys without an explicit override.
    pub fn default_params(&self) -> BucketParams {
        BucketParams::new(self.default_capacity, self.default_refill_rate_per_sec)
    }
}
