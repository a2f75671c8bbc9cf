//! API handlers.
//!
//! Each handler takes already-extracted request parts and returns an
//! [`ApiReply`]; turning it into an HTTP response is left to the routes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use serde::Serialize;
use warp::http::{header, HeaderMap, Method, StatusCode};

use crate::data_capture::{Interaction, Protocol};
use crate::network::host_without_port;
use crate::session_management::{IngestOutcome, Ingestor, Poller, RegistrationGate};
use crate::storage::CorrelationStore;

use super::default_page::{self, DefaultPage};
use super::types::{ApiMessage, PollResponse, SessionRequest};

/// Status plus optional JSON body of an API response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Option<serde_json::Value>,
}

impl ApiReply {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self {
                status,
                body: Some(body),
            },
            Err(e) => {
                warn!("Could not encode response: {}", e);
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, "could not encode response")
            }
        }
    }

    fn message(message: &str) -> Self {
        Self::json(
            StatusCode::OK,
            &ApiMessage {
                message: message.to_string(),
            },
        )
    }

    fn error(status: StatusCode, error: impl Into<String>) -> Self {
        let mut body = serde_json::Map::new();
        body.insert("error".to_string(), serde_json::Value::String(error.into()));
        Self {
            status,
            body: Some(serde_json::Value::Object(body)),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: None,
        }
    }

    pub fn preflight() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }
}

/// Shared state of the API routes.
pub struct ApiContext {
    gate: RegistrationGate,
    poller: Poller,
    store: Arc<CorrelationStore>,
    /// Required `Authorization` value; `None` disables the check.
    token: Option<String>,
}

impl ApiContext {
    pub fn new(
        gate: RegistrationGate,
        poller: Poller,
        store: Arc<CorrelationStore>,
        token: Option<String>,
    ) -> Self {
        Self {
            gate,
            poller,
            store,
            token,
        }
    }

    /// Compares the raw `Authorization` bytes, so a value that is not
    /// valid UTF-8 is simply a wrong token.
    pub fn authorized(&self, authorization: Option<&[u8]>) -> bool {
        match &self.token {
            Some(token) => authorization == Some(token.as_bytes()),
            None => true,
        }
    }

    /// Runs `handler` when the request is authorized.
    pub fn guarded(
        &self,
        authorization: Option<&[u8]>,
        handler: impl FnOnce(&Self) -> ApiReply,
    ) -> ApiReply {
        if self.authorized(authorization) {
            handler(self)
        } else {
            debug!("Rejected unauthorized API request");
            ApiReply::unauthorized()
        }
    }

    /// Answer for an API request whose query or body could not be read.
    pub fn unreadable_request(&self, authorization: Option<&[u8]>) -> ApiReply {
        self.guarded(authorization, |_| {
            ApiReply::error(StatusCode::BAD_REQUEST, "could not read request")
        })
    }

    pub fn register(&self, body: &[u8]) -> ApiReply {
        let request = match decode(body) {
            Ok(request) => request,
            Err(reply) => return reply,
        };
        match self.gate.register(&request.session_id, &request.token) {
            Ok(()) => ApiReply::message("registration successful"),
            Err(e) => {
                warn!("Could not register session {:?}: {}", request.session_id, e);
                ApiReply::error(
                    StatusCode::BAD_REQUEST,
                    format!("could not register session: {}", e),
                )
            }
        }
    }

    pub fn deregister(&self, body: &[u8]) -> ApiReply {
        let request = match decode(body) {
            Ok(request) => request,
            Err(reply) => return reply,
        };
        match self.gate.deregister(&request.session_id, &request.token) {
            Ok(()) => ApiReply::message("deregistration successful"),
            Err(e) => {
                warn!("Could not deregister session {:?}: {}", request.session_id, e);
                ApiReply::error(
                    StatusCode::BAD_REQUEST,
                    format!("could not deregister session: {}", e),
                )
            }
        }
    }

    /// `GET /poll?id=<correlation id>&secret=<secret>`
    pub fn poll(&self, query: &HashMap<String, String>) -> ApiReply {
        let id = match query.get("id").filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => return ApiReply::error(StatusCode::BAD_REQUEST, "no id specified for poll"),
        };
        let secret = match query.get("secret").filter(|secret| !secret.is_empty()) {
            Some(secret) => secret,
            None => {
                return ApiReply::error(StatusCode::BAD_REQUEST, "no secret specified for poll")
            }
        };

        match self.poller.poll(id, secret) {
            Ok(result) => ApiReply::json(StatusCode::OK, &PollResponse::from(result)),
            Err(e) => {
                debug!("Could not poll {}: {}", id, e);
                ApiReply::error(
                    StatusCode::BAD_REQUEST,
                    format!("could not get interactions: {}", e),
                )
            }
        }
    }

    pub fn metrics(&self) -> ApiReply {
        ApiReply::json(StatusCode::OK, &self.store.metrics())
    }
}

/// A request that reached the catch-all handler.
pub struct CapturedRequest {
    pub method: Method,
    /// Path plus query, as sent.
    pub target: String,
    pub headers: HeaderMap,
    pub remote: Option<SocketAddr>,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn host(&self) -> &str {
        self.headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }
}

/// Answers every request outside the API and records it as an interaction.
pub struct DefaultSite {
    domain: String,
    ingestor: Ingestor,
}

impl DefaultSite {
    pub fn new(domain: impl Into<String>, ingestor: Ingestor) -> Self {
        Self {
            domain: domain.into(),
            ingestor,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Renders the page for `request` and hands the exchange to ingestion.
    pub fn capture(&self, request: &CapturedRequest) -> (DefaultPage, IngestOutcome) {
        let host = host_without_port(request.host());
        let page = default_page::render(&self.domain, host, request.path());

        let remote = request
            .remote
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default();
        let interaction = Interaction::new(Protocol::Http, remote).with_exchange(
            default_page::dump_request(
                &request.method,
                &request.target,
                &request.headers,
                &request.body,
            ),
            default_page::dump_response(&page, &self.domain),
        );
        let outcome = self.ingestor.ingest_host(host, interaction);
        (page, outcome)
    }
}

fn decode(body: &[u8]) -> Result<SessionRequest, ApiReply> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Could not decode json body: {}", e);
        ApiReply::error(
            StatusCode::BAD_REQUEST,
            format!("could not decode json body: {}", e),
        )
    })
}
