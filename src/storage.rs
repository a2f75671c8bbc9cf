//! In-memory interaction store.
//!
//! Components:
//! - `correlation_store`: the session map with capacity and TTL bounds.
//! - `record`: per-session log and its lock.
//! - `sweeper`: background task removing expired sessions.
//! - `types`: settings and metrics.

pub mod correlation_store;
mod record;
pub mod sweeper;
pub mod types;

pub use correlation_store::CorrelationStore;
pub use sweeper::Sweeper;
pub use types::{StoreMetrics, StoreSettings, DEFAULT_CAPACITY};
