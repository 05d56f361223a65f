//! Common test utilities for scheduler integration tests.

#![allow(dead_code)]

pub mod fixtures;

use corral_scheduler::{
    api::{self, AppState},
    ClusterService, ClusterStore, MemoryStore, ScoreScheduler,
};
use std::sync::Arc;
use std::time::Duration;

/// Complete test registry setup with all components wired together.
pub struct TestRegistry {
    pub store: Arc<MemoryStore>,
    pub service: Arc<ClusterService>,
    pub app_state: Arc<AppState>,
}

impl TestRegistry {
    /// Creates a new test registry with a generous request deadline.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    /// Creates a new test registry with a custom request deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn ClusterStore> = store.clone();
        let service = Arc::new(ClusterService::new(
            dyn_store,
            Arc::new(ScoreScheduler::new()),
            timeout,
        ));
        let app_state = Arc::new(AppState {
            service: service.clone(),
        });

        Self {
            store,
            service,
            app_state,
        }
    }

    /// Builds a fresh router over the shared state.
    pub fn router(&self) -> axum::Router {
        api::router(self.app_state.clone())
    }

    /// Serves the API on an ephemeral local port and returns its base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
