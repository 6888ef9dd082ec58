//! Periodic timeout sweep of in-progress measurements.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, Mutex};

use crate::measurement::MeasurementStore;

/// Runs [`MeasurementStore::cleanup`] at a jittered interval.
pub struct CleanupManager {
    store: Arc<MeasurementStore>,
    interval: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

/// `interval` scaled by a random factor in `[0.5, 1.5)`.
pub fn jittered(interval: Duration) -> Duration {
    interval.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}

impl CleanupManager {
    pub fn new(store: Arc<MeasurementStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the cleanup background task.
    pub fn schedule_cleanup(&self) {
        let store = self.store.clone();
        let stop = self.stop.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let (tx, _) = broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(jittered(interval)) => {
                        if let Err(e) = store.cleanup().await {
                            tracing::error!("CleanupManager: sweep failed: {}", e);
                        }
                    }
                }
            }
        });
    }

    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}
