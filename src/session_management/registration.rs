use std::sync::Arc;

use log::debug;

use crate::error_handling::types::StoreError;
use crate::storage::CorrelationStore;

/// The one place a session id gets bound to its client secret.
///
/// Registration is accepted or rejected immediately; there are no retries.
#[derive(Clone)]
pub struct RegistrationGate {
    store: Arc<CorrelationStore>,
}

impl RegistrationGate {
    pub fn new(store: Arc<CorrelationStore>) -> Self {
        Self { store }
    }

    pub fn register(&self, session_id: &str, secret: &str) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        self.store.register(session_id, secret)?;
        debug!("Registered correlation id {}", session_id);
        Ok(())
    }

    /// Removes a session. The secret must match the one it registered with.
    pub fn deregister(&self, session_id: &str, secret: &str) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        self.store.remove(session_id, secret)?;
        debug!("Deregistered correlation id {}", session_id);
        Ok(())
    }
}

fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    if session_id.is_empty() {
        return Err(StoreError::InvalidInput("empty session-id".to_string()));
    }
    Ok(())
}
