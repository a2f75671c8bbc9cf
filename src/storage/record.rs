use parking_lot::Mutex;
use tokio::time::Instant;

use crate::data_capture::CompressedInteraction;

/// Store entry for one registered session or pinned bucket.
///
/// The record owns both its log and the lock guarding it; the lock is only
/// ever held for a push or a swap, never across compression.
#[derive(Debug)]
pub(crate) struct CorrelationRecord {
    secret: String,
    log: Mutex<Vec<CompressedInteraction>>,
    /// `None` for pinned buckets, which never expire.
    expires_at: Option<Instant>,
}

impl CorrelationRecord {
    pub(crate) fn session(secret: &str, expires_at: Option<Instant>) -> Self {
        Self {
            secret: secret.to_string(),
            log: Mutex::new(Vec::new()),
            expires_at,
        }
    }

    pub(crate) fn pinned() -> Self {
        Self::session("", None)
    }

    pub(crate) fn push(&self, item: CompressedInteraction) {
        self.log.lock().push(item);
    }

    /// Swaps the log for an empty one and hands back what was there.
    pub(crate) fn take_log(&self) -> Vec<CompressedInteraction> {
        std::mem::take(&mut *self.log.lock())
    }

    pub(crate) fn pending(&self) -> usize {
        self.log.lock().len()
    }

    pub(crate) fn secret_matches(&self, secret: &str) -> bool {
        self.secret == secret
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}
