use std::sync::Arc;

use log::debug;

use crate::error_handling::types::StoreError;
use crate::storage::CorrelationStore;

use super::BucketKeys;

/// Everything a single poll hands back to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollResult {
    /// The session's own interactions.
    pub data: Vec<String>,
    /// Operator bucket contents.
    pub extra: Vec<String>,
    /// Root-domain bucket contents; `None` when root-domain capture is off.
    pub tld_data: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct Poller {
    store: Arc<CorrelationStore>,
    buckets: BucketKeys,
}

impl Poller {
    pub fn new(store: Arc<CorrelationStore>, buckets: BucketKeys) -> Self {
        Self { store, buckets }
    }

    /// Drains the session plus the auxiliary buckets.
    ///
    /// Only the session drain can fail the poll. Once the caller has proven
    /// it owns the session, the auxiliary buckets are drained best effort and
    /// come back empty if they cannot be read.
    pub fn poll(&self, session_id: &str, secret: &str) -> Result<PollResult, StoreError> {
        let data = self.store.drain_with_secret(session_id, secret)?;

        let extra = self
            .buckets
            .operator
            .as_deref()
            .and_then(|bucket| self.store.drain_bucket(bucket).ok())
            .unwrap_or_default();

        let tld_data = self
            .buckets
            .root_domain
            .as_deref()
            .map(|bucket| self.store.drain_bucket(bucket).unwrap_or_default());

        debug!("Polled {} interaction(s) for {}", data.len(), session_id);
        Ok(PollResult {
            data: into_strings(data),
            extra: into_strings(extra),
            tld_data: tld_data.map(into_strings),
        })
    }
}

fn into_strings(items: Vec<Vec<u8>>) -> Vec<String> {
    items
        .into_iter()
        .map(|raw| match String::from_utf8(raw) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
        .collect()
}
