use std::time::Duration;

use serde::Serialize;

use crate::data_capture::codec::DEFAULT_POOL_SIZE;

/// Default bound on the number of live store entries.
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Construction parameters for a [`CorrelationStore`](super::CorrelationStore).
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Maximum number of live entries, pinned buckets included.
    pub capacity: usize,
    /// Session lifetime, counted from registration.
    pub ttl: Duration,
    /// Idle compressors kept for reuse.
    pub pool_size: usize,
    /// Keys of long-lived buckets created up front (operator token, root domain).
    pub pinned_buckets: Vec<String>,
}

impl StoreSettings {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            pool_size: DEFAULT_POOL_SIZE,
            pinned_buckets: Vec::new(),
        }
    }

    pub fn with_pinned_bucket(mut self, key: impl Into<String>) -> Self {
        self.pinned_buckets.push(key.into());
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }
}

/// Utilisation snapshot served on `/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    #[serde(rename = "active-session")]
    pub active: usize,
    #[serde(rename = "evicted-session")]
    pub evicted: usize,
}
