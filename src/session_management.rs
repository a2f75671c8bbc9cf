//! Client-facing session boundaries over the interaction store.
//!
//! - `registration`: binds a session id to its client secret.
//! - `ingest`: how protocol adapters hand captured interactions to the store.
//! - `poll`: how clients collect and clear their interactions.

pub mod ingest;
pub mod poll;
pub mod registration;

pub use ingest::{IngestOutcome, Ingestor};
pub use poll::{PollResult, Poller};
pub use registration::RegistrationGate;

/// Keys of the pinned store buckets that sit beside client sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketKeys {
    /// Server-wide bucket keyed by the operator token, delivered to every
    /// authenticated poll.
    pub operator: Option<String>,
    /// Bucket keyed by the bare managed domain, when root-domain capture is on.
    pub root_domain: Option<String>,
}

impl BucketKeys {
    pub fn pinned(&self) -> Vec<String> {
        self.operator
            .iter()
            .chain(self.root_domain.iter())
            .cloned()
            .collect()
    }
}
