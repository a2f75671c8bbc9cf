use serde::{Deserialize, Serialize};

use crate::session_management::PollResult;

/// Body of `/register` and `/deregister`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionRequest {
    /// Client secret bound to the session.
    pub token: String,
    #[serde(rename = "session-id")]
    pub session_id: String,
}

/// Body of a successful `/poll`.
#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub data: Vec<String>,
    pub extra: Vec<String>,
    /// Always empty; kept for clients that still read it.
    pub aes_key: String,
    #[serde(rename = "tlddata", skip_serializing_if = "is_none_or_empty")]
    pub tld_data: Option<Vec<String>>,
}

fn is_none_or_empty(items: &Option<Vec<String>>) -> bool {
    items.as_ref().map_or(true, Vec::is_empty)
}

impl From<PollResult> for PollResponse {
    fn from(result: PollResult) -> Self {
        Self {
            data: result.data,
            extra: result.extra,
            aes_key: String::new(),
            tld_data: result.tld_data,
        }
    }
}

/// API success payload
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}
