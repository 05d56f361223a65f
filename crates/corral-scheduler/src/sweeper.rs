//! Background purge of soft-deleted clusters.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SweeperConfig;
use crate::error::Result;
use crate::store::ClusterStore;

/// Periodically removes rows already marked deleted.
pub struct Sweeper {
    store: Arc<dyn ClusterStore>,
    config: SweeperConfig,
}

impl Sweeper {
    /// Creates a sweeper.
    pub fn new(store: Arc<dyn ClusterStore>, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// Purges one batch and returns the number of rows removed.
    pub async fn sweep_once(&self) -> Result<u64> {
        let purged = self.store.purge_deleted(self.config.batch_size).await?;
        if purged > 0 {
            info!(purged, "Purged soft-deleted clusters");
        } else {
            debug!("No soft-deleted clusters to purge");
        }
        Ok(purged)
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Storage errors are logged and retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "Sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, retryable = e.is_retryable(), "Sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Sweeper stopped");
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Cluster;
    use std::time::Duration;

    fn config(batch_size: u32) -> SweeperConfig {
        SweeperConfig {
            enabled: true,
            interval: Duration::from_millis(10),
            batch_size,
        }
    }

    #[tokio::test]
    async fn sweep_once_respects_batch_size() {
        let store = Arc::new(MemoryStore::new());
        for name in ["a", "b", "c"] {
            store.insert(&Cluster::new(name, "https://x")).await.unwrap();
            store.soft_delete(name).await.unwrap();
        }
        store.insert(&Cluster::new("live", "https://x")).await.unwrap();

        let sweeper = Sweeper::new(store.clone(), config(2));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn run_purges_and_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&Cluster::new("a", "https://x")).await.unwrap();
        store.soft_delete("a").await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Sweeper::new(store.clone(), config(10)).run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
