use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::Aggregator;

/// Periodic drift of the simulated vitals
pub struct DriftTask;

impl DriftTask {
    /// Spawn the drift loop. The first tick fires one `period` from now.
    ///
    /// The loop runs until [`DriftHandle::stop`] is called or the handle is
    /// dropped.
    pub fn spawn(aggregator: Arc<Aggregator>, period: Duration) -> DriftHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Drift task started, every {:?}", period);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        aggregator.drift().await;
                    }
                }
            }

            debug!("Drift task stopped");
        });

        DriftHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
        }
    }
}

/// Owner of a running drift loop
#[derive(Debug)]
pub struct DriftHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl DriftHandle {
    /// Stop the loop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            stop_tx.send(()).ok();
        }
        if let Some(join) = self.join.take() {
            join.await.ok();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for DriftHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
