use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::correlation_store::CorrelationStore;

/// Background task that periodically drops expired sessions from a
/// [`CorrelationStore`].
///
/// The task runs on its own cadence, independent of request traffic, until
/// [`stop`](Self::stop) is called or the handle is dropped.
pub struct Sweeper {
    handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Sweeper {
    /// Spawns the sweep loop on the current tokio runtime.
    pub fn spawn(store: Arc<CorrelationStore>, period: Duration) -> Self {
        let (shutdown, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            debug!("TTL sweep removed {} expired session(s)", removed);
                        }
                    }
                }
            }
            debug!("TTL sweeper stopped");
        });

        info!("TTL sweeper started (period {:?})", period);
        Self {
            handle,
            shutdown: Some(shutdown),
        }
    }

    /// Signals the loop to exit and waits for it.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
