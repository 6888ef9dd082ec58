//! Vantage - probe selection and measurement storage for a distributed
//! network-measurement fleet.

mod config;
mod db;
mod measurement;
mod probe;
mod router;
mod scheduler;
mod web;

use config::Config;
use db::{ColdStore, MemoryHotStore};
use measurement::{MeasurementStore, ResultDispatcher};
use probe::{Probe, ProbeRegistry};
use router::{LocationFilter, ProbeRouter};
use scheduler::{CleanupManager, MeasurementOffloader, RetryWorker};
use web::{AppState, Server};

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HOT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn load_probes(path: &str) -> Result<Vec<Probe>, Box<dyn std::error::Error + Send + Sync>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("vantage=info".parse()?))
        .init();

    let cfg = Config::load()?;
    tracing::info!("Starting Vantage on port {}...", cfg.http_port);
    tracing::info!("Using cold database at {}", cfg.db_path);

    let cold = ColdStore::new(&cfg.db_path, cfg.tier_tables.clone())?;
    let hot = Arc::new(MemoryHotStore::new());
    tracing::info!("Storage initialized successfully");

    let purge_hot = hot.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOT_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_hot.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} expired hot keys", purged);
            }
        }
    });

    let filter = Arc::new(LocationFilter::new(cfg.continent_weights.clone()));
    let registry = Arc::new(ProbeRegistry::new(filter.clone()));
    if let Some(path) = &cfg.probes_path {
        let probes = load_probes(path)?;
        registry.replace_probes(probes);
        tracing::info!("Loaded {} probes from {}", registry.len(), path);
    }
    if registry.is_empty() {
        tracing::warn!("No probes loaded; every measurement request will be rejected");
    }

    let offloader = Arc::new(MeasurementOffloader::new(hot.clone(), cold.clone(), &cfg));
    let store = Arc::new(MeasurementStore::new(hot, cold, offloader.clone(), &cfg));
    let router = Arc::new(ProbeRouter::new(filter, registry, store.clone()));
    let dispatcher = ResultDispatcher::spawn(store.clone(), 1000);

    let retry_worker = Arc::new(RetryWorker::new(offloader, &cfg));
    retry_worker.start();
    let cleanup = CleanupManager::new(store.clone(), cfg.cleanup_interval);
    cleanup.schedule_cleanup();

    let server = Server::new(
        cfg.http_port,
        AppState {
            router,
            store,
            dispatcher,
        },
    );
    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down...");
        })
        .await?;

    retry_worker.stop().await;
    cleanup.stop().await;

    Ok(())
}
