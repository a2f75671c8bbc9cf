use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::info;
use warp::http::HeaderValue;

use crate::error_handling::types::WebError;

use super::handlers::{ApiContext, DefaultSite};
use super::routes::{origin_header, routes};

/// HTTP front end: the client API plus the catch-all capture handler.
pub struct WebServer {
    address: SocketAddr,
    api: Arc<ApiContext>,
    site: Arc<DefaultSite>,
    origin: HeaderValue,
}

impl WebServer {
    pub fn new(
        listen_ip: &str,
        port: u16,
        origin_url: &str,
        api: ApiContext,
        site: DefaultSite,
    ) -> Result<Self, WebError> {
        let ip: IpAddr = listen_ip
            .parse()
            .map_err(|_| WebError::InvalidAddress(listen_ip.to_string()))?;
        let origin = origin_header(origin_url)
            .map_err(|e| WebError::InvalidHeader(format!("origin {:?}: {}", origin_url, e)))?;

        Ok(Self {
            address: SocketAddr::new(ip, port),
            api: Arc::new(api),
            site: Arc::new(site),
            origin,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Serves until the returned future is dropped.
    pub async fn start(&self) -> Result<(), WebError> {
        // warp panics when it cannot bind, so check the address first.
        let listener = tokio::net::TcpListener::bind(self.address)
            .await
            .map_err(WebError::BindFailed)?;
        drop(listener);

        let routes = routes(self.api.clone(), self.site.clone(), self.origin.clone());

        info!("HTTP server listening on {}", self.address);
        warp::serve(routes).run(self.address).await;
        Ok(())
    }
}
