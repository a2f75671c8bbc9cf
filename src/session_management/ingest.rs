//! Ingestion boundary used by every protocol adapter.
//!
//! An adapter that captured a network event passes the host-like field it
//! saw (HTTP `Host`, DNS question name, SMTP recipient domain, ...) and an
//! [`Interaction`] describing the event. The boundary works out where the
//! event belongs, serialises it to JSON and appends it to the store.

use std::sync::Arc;

use log::{debug, warn};

use crate::data_capture::Interaction;
use crate::error_handling::types::StoreError;
use crate::network::{extract_identifier, is_bare_domain};
use crate::storage::CorrelationStore;

use super::BucketKeys;

/// Where an interaction ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Correlation id of the session that received it.
    pub session: Option<String>,
    /// Whether the root-domain bucket received it.
    pub root_domain: bool,
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<CorrelationStore>,
    buckets: BucketKeys,
}

impl Ingestor {
    pub fn new(store: Arc<CorrelationStore>, buckets: BucketKeys) -> Self {
        Self { store, buckets }
    }

    /// Appends `interaction` to the session keyed by `correlation_id`.
    pub fn ingest(&self, correlation_id: &str, interaction: &Interaction) -> Result<(), StoreError> {
        let payload = encode(interaction)?;
        self.store.append(correlation_id, &payload)
    }

    /// Routes an interaction by the host it was addressed to.
    ///
    /// Root-domain capture and identifier routing are independent: a host
    /// equal to the managed domain lands in the root-domain bucket, and a
    /// host carrying an identifier lands in that session. Failures are
    /// logged and reflected in the outcome rather than returned, since the
    /// adapter has already answered its peer.
    pub fn ingest_host(&self, host: &str, interaction: Interaction) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        if let Some(domain) = &self.buckets.root_domain {
            if is_bare_domain(host, domain) {
                let mut root = interaction.clone();
                root.unique_id = host.to_string();
                root.full_id = host.to_string();
                match encode(&root).and_then(|p| self.store.append_to_bucket(domain, &p)) {
                    Ok(()) => {
                        debug!("Root domain {:?} interaction from {}", root.protocol, root.remote_address);
                        outcome.root_domain = true;
                    }
                    Err(e) => warn!("Could not store root domain interaction: {}", e),
                }
            }
        }

        if let Some(id) = extract_identifier(host) {
            let mut routed = interaction;
            routed.unique_id = id.unique_id;
            routed.full_id = id.full_id;
            match self.ingest(&id.correlation_id, &routed) {
                Ok(()) => {
                    debug!(
                        "{:?} interaction for {} from {}",
                        routed.protocol, id.correlation_id, routed.remote_address
                    );
                    outcome.session = Some(id.correlation_id);
                }
                Err(e) => debug!(
                    "Could not store interaction for {}: {}",
                    id.correlation_id, e
                ),
            }
        }

        outcome
    }

    /// Appends to the server-wide operator bucket, bypassing session routing.
    pub fn ingest_operator(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let bucket = self
            .buckets
            .operator
            .as_deref()
            .ok_or(StoreError::UnknownSession)?;
        let payload = encode(interaction)?;
        self.store.append_to_bucket(bucket, &payload)
    }
}

fn encode(interaction: &Interaction) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(interaction).map_err(|e| StoreError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::Protocol;
    use crate::network::IDENTIFIER_WIDTH;
    use crate::storage::StoreSettings;
    use std::time::Duration;

    const DOMAIN: &str = "oast.example";
    const TOKEN: &str = "operator-token";

    fn setup(root_tld: bool) -> (Ingestor, Arc<CorrelationStore>) {
        let buckets = BucketKeys {
            operator: Some(TOKEN.to_string()),
            root_domain: root_tld.then(|| DOMAIN.to_string()),
        };
        let mut settings = StoreSettings::new(64, Duration::from_secs(60));
        for key in buckets.pinned() {
            settings = settings.with_pinned_bucket(key);
        }
        let store = Arc::new(CorrelationStore::new(settings));
        (Ingestor::new(store.clone(), buckets), store)
    }

    fn identifier() -> String {
        let id = "c59e3crp82ke7bcnedq0xyzabcdefghij";
        assert_eq!(id.len(), IDENTIFIER_WIDTH);
        id.to_string()
    }

    fn decode(raw: &[u8]) -> Interaction {
        serde_json::from_slice(raw).unwrap()
    }

    #[test]
    fn routes_by_embedded_identifier() {
        let (ingestor, store) = setup(false);
        store.register("c59e3crp82ke7bcnedq0", "secret").unwrap();

        let host = format!("extra.{}.{}", identifier(), DOMAIN);
        let interaction = Interaction::new(Protocol::Dns, "198.51.100.7").with_q_type("A");
        let outcome = ingestor.ingest_host(&host, interaction);

        assert_eq!(outcome.session.as_deref(), Some("c59e3crp82ke7bcnedq0"));
        assert!(!outcome.root_domain);

        let drained = store.drain("c59e3crp82ke7bcnedq0").unwrap();
        assert_eq!(drained.len(), 1);
        let stored = decode(&drained[0]);
        assert_eq!(stored.unique_id, identifier());
        assert_eq!(stored.full_id, format!("extra.{}", identifier()));
        assert_eq!(stored.q_type.as_deref(), Some("A"));
    }

    #[test]
    fn unregistered_identifier_is_dropped() {
        let (ingestor, store) = setup(false);
        let host = format!("{}.{}", identifier(), DOMAIN);

        let outcome = ingestor.ingest_host(&host, Interaction::new(Protocol::Http, "192.0.2.1"));
        assert_eq!(outcome, IngestOutcome::default());
        assert!(!store.contains("c59e3crp82ke7bcnedq0"));
    }

    #[test]
    fn bare_domain_goes_to_root_bucket() {
        let (ingestor, store) = setup(true);

        let outcome = ingestor.ingest_host(
            "OAST.example:80",
            Interaction::new(Protocol::Smtp, "192.0.2.1").with_smtp_from("probe@test"),
        );
        assert!(outcome.root_domain);
        assert!(outcome.session.is_none());

        let drained = store.drain_bucket(DOMAIN).unwrap();
        let stored = decode(&drained[0]);
        assert_eq!(stored.unique_id, "OAST.example:80");
        assert_eq!(stored.smtp_from.as_deref(), Some("probe@test"));
    }

    #[test]
    fn bare_domain_ignored_without_root_capture() {
        let (ingestor, store) = setup(false);
        let outcome = ingestor.ingest_host(DOMAIN, Interaction::new(Protocol::Http, "192.0.2.1"));
        assert!(!outcome.root_domain);
        assert!(matches!(store.drain_bucket(DOMAIN), Err(StoreError::UnknownSession)));
    }

    #[test]
    fn operator_bucket_bypasses_routing() {
        let (ingestor, store) = setup(false);
        ingestor
            .ingest_operator(&Interaction::new(Protocol::Ldap, "192.0.2.50"))
            .unwrap();

        let drained = store.drain_bucket(TOKEN).unwrap();
        assert_eq!(decode(&drained[0]).protocol, Protocol::Ldap);
    }

    #[test]
    fn direct_ingest_requires_live_session() {
        let (ingestor, _) = setup(false);
        assert!(matches!(
            ingestor.ingest("unknown", &Interaction::new(Protocol::Ftp, "192.0.2.1")),
            Err(StoreError::UnknownSession)
        ));
    }
}
