//! Data types shared by the capture adapters and the interaction store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Network protocol an interaction was captured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Dns,
    Smtp,
    Ftp,
    Ldap,
    Smb,
}

/// One captured network event, in the JSON shape handed back to clients.
///
/// Optional fields are protocol specific and are left out of the JSON when
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub protocol: Protocol,
    /// The identifier label the event was addressed to (or the whole host
    /// for root-domain captures).
    #[serde(rename = "unique-id")]
    pub unique_id: String,
    #[serde(rename = "full-id")]
    pub full_id: String,
    /// DNS question type.
    #[serde(rename = "q-type", default, skip_serializing_if = "Option::is_none")]
    pub q_type: Option<String>,
    #[serde(rename = "raw-request", default, skip_serializing_if = "Option::is_none")]
    pub raw_request: Option<String>,
    #[serde(rename = "raw-response", default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    /// SMTP `MAIL FROM` address.
    #[serde(rename = "smtp-from", default, skip_serializing_if = "Option::is_none")]
    pub smtp_from: Option<String>,
    #[serde(rename = "remote-address")]
    pub remote_address: String,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    /// Starts a record stamped with the current time. Routing ids are filled
    /// in by the ingestion boundary.
    pub fn new(protocol: Protocol, remote_address: impl Into<String>) -> Self {
        Self {
            protocol,
            unique_id: String::new(),
            full_id: String::new(),
            q_type: None,
            raw_request: None,
            raw_response: None,
            smtp_from: None,
            remote_address: remote_address.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_exchange(mut self, raw_request: String, raw_response: String) -> Self {
        self.raw_request = Some(raw_request);
        self.raw_response = Some(raw_response);
        self
    }

    pub fn with_q_type(mut self, q_type: impl Into<String>) -> Self {
        self.q_type = Some(q_type.into());
        self
    }

    pub fn with_smtp_from(mut self, from: impl Into<String>) -> Self {
        self.smtp_from = Some(from.into());
        self
    }
}

/// A compressed interaction as held in a record's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedInteraction {
    /// Length of the payload before compression.
    pub raw_len: usize,
    /// A single zstd frame.
    pub frame: Vec<u8>,
}
