//! Corral scheduler binary.
//!
//! Serves the cluster registry API and runs the soft-delete sweeper.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use corral_scheduler::{
    api, ClusterService, ClusterStore, MemoryStore, PlacementAlgorithm, PostgresStore,
    SchedulerConfig, ScoreScheduler, StorageBackend, Sweeper,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("corral_scheduler=info".parse()?),
        )
        .init();

    info!("Corral scheduler starting");

    let config = SchedulerConfig::load()?;
    info!(
        listen_addr = %config.api.listen_addr,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let store: Arc<dyn ClusterStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory store; registrations are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Postgres => {
            let store = PostgresStore::connect(&config.storage).await?;
            info!("Connected to PostgreSQL");
            Arc::new(store)
        }
    };

    let placement: Arc<dyn PlacementAlgorithm> = Arc::new(ScoreScheduler::new());
    info!(algorithm = placement.name(), "Placement algorithm configured");

    let service = Arc::new(ClusterService::new(
        Arc::clone(&store),
        placement,
        config.requests.timeout,
    ));

    service.seed_static(&config.static_clusters).await?;
    if !config.static_clusters.is_empty() {
        info!(
            count = config.static_clusters.len(),
            "Static clusters seeded"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = if config.sweeper.enabled {
        let sweeper = Sweeper::new(Arc::clone(&store), config.sweeper.clone());
        Some(tokio::spawn(sweeper.run(shutdown_rx)))
    } else {
        info!("Sweeper disabled");
        None
    };

    let app = api::router(Arc::new(api::AppState { service }));

    let listener = TcpListener::bind(&config.api.listen_addr).await?;
    info!(addr = %config.api.listen_addr, "Scheduler API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            error!(error = %e, "Sweeper task failed");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
