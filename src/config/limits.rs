//! Rate-limit and request-sizing configuration.

use std::time::Duration;

use serde::Deserialize;

fn default_enabled() -> bool {
    true
}

fn default_limit() -> u32 {
    1
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_partitions() -> usize {
    100_000
}

fn default_sweep_batch_size() -> usize {
    1024
}

/// Request limits applied by the middleware stack.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Fixed-window rate limiting, partitioned by route and client address.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Disable to admit every request without consulting the store.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Admissions allowed per partition within one window.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Window length in seconds. A fresh window starts when a request
    /// arrives after the previous one has elapsed.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Upper bound on concurrently tracked partitions.
    #[serde(default = "default_max_partitions")]
    pub max_partitions: usize,
    /// Partitions dropped per sweep once the table is full.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            limit: default_limit(),
            window_secs: default_window_secs(),
            max_partitions: default_max_partitions(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
