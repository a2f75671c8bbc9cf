use std::sync::Arc;

use log::{error, info, warn};

use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::session_management::{Ingestor, Poller, RegistrationGate};
use crate::storage::{CorrelationStore, Sweeper};
use crate::web_interface::{ApiContext, DefaultSite, WebServer};

/// Owns the store and the HTTP server for the lifetime of the process.
pub struct Controller {
    pub config: Config,
    store: Arc<CorrelationStore>,
    server: WebServer,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initialising controller for {}", config.domain);

        let buckets = config.bucket_keys();
        let store = Arc::new(CorrelationStore::new(config.store_settings()));

        let api = ApiContext::new(
            RegistrationGate::new(store.clone()),
            Poller::new(store.clone(), buckets.clone()),
            store.clone(),
            config.auth.then(|| config.token.clone()).flatten(),
        );
        let site = DefaultSite::new(config.domain.clone(), Ingestor::new(store.clone(), buckets));
        let server = WebServer::new(
            &config.listen_ip,
            config.http_port,
            &config.origin_url,
            api,
            site,
        )?;

        Ok(Self {
            config,
            store,
            server,
        })
    }

    pub fn store(&self) -> Arc<CorrelationStore> {
        self.store.clone()
    }

    /// Runs until the HTTP server stops or the process receives Ctrl-C.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let sweeper = Sweeper::spawn(self.store.clone(), self.config.sweep_interval());

        let result = tokio::select! {
            served = self.server.start() => served.map_err(ControllerError::from),
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Received Ctrl-C, shutting down"),
                    Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
                }
                Ok(())
            }
        };

        sweeper.stop().await;
        if let Err(e) = &result {
            error!("Controller stopped: {}", e);
        }
        self.shutdown();
        result
    }

    pub fn shutdown(&self) {
        let metrics = self.store.metrics();
        info!(
            "Shutdown with {} active session(s), {} evicted",
            metrics.active, metrics.evicted
        );
    }
}
