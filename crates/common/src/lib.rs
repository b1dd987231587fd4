pub mod config;
pub mod error;

pub use config::{BucketParams, EvictionConfig, RateLimitConfig};
pub use error::{WardenError, WardenResult};
