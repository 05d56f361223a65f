//! Cluster lifecycle service.
//!
//! The only writer of the registry. Every operation runs under the
//! configured request deadline; when it expires the caller gets
//! `DeadlineExceeded` and must re-read by name to learn whether the write
//! landed.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use corral_proto::{
    AdmissionReport, ClusterState, ClusterStatus, DeregisterRequest, Placement, RegisterRequest,
    UpdateRequest, Workload,
};
use tracing::{debug, info, warn};

use crate::admission;
use crate::config::StaticCluster;
use crate::error::{Result, SchedulerError};
use crate::placement::PlacementAlgorithm;
use crate::store::{ClusterFilter, ClusterStore};
use crate::types::{dedup_constraints, Cluster, ClusterMutation, TlsMaterial};

/// Counters exposed on `/metrics`.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Successful registrations.
    pub registrations: AtomicU64,
    /// Successful deregistrations.
    pub deregistrations: AtomicU64,
    /// Scheduling requests that found a cluster.
    pub placements: AtomicU64,
    /// Scheduling requests that ended in `NoCapacity`.
    pub no_capacity: AtomicU64,
    /// Operations that hit their deadline.
    pub deadlines_exceeded: AtomicU64,
}

impl ServiceMetrics {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads a counter.
    #[must_use]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Validates and applies lifecycle operations against a [`ClusterStore`].
pub struct ClusterService {
    store: Arc<dyn ClusterStore>,
    placement: Arc<dyn PlacementAlgorithm>,
    timeout: Duration,
    metrics: ServiceMetrics,
}

impl ClusterService {
    /// Creates a new service.
    pub fn new(
        store: Arc<dyn ClusterStore>,
        placement: Arc<dyn PlacementAlgorithm>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            placement,
            timeout,
            metrics: ServiceMetrics::default(),
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ClusterStore> {
        &self.store
    }

    /// Operation counters.
    #[must_use]
    pub const fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Name of the configured placement algorithm.
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.placement.name()
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                ServiceMetrics::incr(&self.metrics.deadlines_exceeded);
                warn!(
                    operation,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Operation deadline exceeded"
                );
                Err(SchedulerError::DeadlineExceeded { operation })
            }
        }
    }

    /// Registers a new cluster.
    pub async fn register(&self, request: RegisterRequest) -> Result<ClusterStatus> {
        validate_name(&request.name)?;
        validate_url(&request.url)?;

        let hints = request.hints.unwrap_or_default();
        let mut cluster = Cluster::new(request.name, request.url);
        cluster.tls = request.tls.map(TlsMaterial::from);
        cluster.score = hints.preferability.initial_score();
        cluster.max_score = corral_proto::score::DEFAULT_MAX;
        cluster.govern = hints.govern;
        if hints.cordoned {
            cluster.state = ClusterState::Cordoned;
        }
        cluster.admission_constraints = dedup_constraints(request.admission_constraints);
        cluster.region = request.region;

        self.with_deadline("register", self.store.insert(&cluster))
            .await?;

        ServiceMetrics::incr(&self.metrics.registrations);
        info!(
            cluster = %cluster.name,
            url = %cluster.url,
            state = %cluster.state,
            score = cluster.score,
            govern = cluster.govern,
            constraints = cluster.admission_constraints.len(),
            "Cluster registered"
        );
        Ok(cluster.status())
    }

    /// Applies a single-property update.
    pub async fn update(&self, request: UpdateRequest) -> Result<ClusterStatus> {
        let mutation = ClusterMutation::from(request.property);
        let cluster = self
            .with_deadline("update", self.store.apply(&request.name, &mutation))
            .await?;

        info!(
            cluster = %cluster.name,
            mutation = ?mutation,
            state = %cluster.state,
            score = cluster.score,
            max_score = cluster.max_score,
            "Cluster updated"
        );
        Ok(cluster.status())
    }

    /// Moves a cluster to `draining`.
    pub async fn drain(&self, name: &str) -> Result<ClusterStatus> {
        let cluster = self
            .with_deadline("drain", self.store.apply(name, &ClusterMutation::Drain))
            .await?;

        info!(cluster = %cluster.name, "Cluster draining");
        Ok(cluster.status())
    }

    /// Deregisters a cluster: soft delete, or hard delete when forced.
    pub async fn deregister(&self, request: DeregisterRequest) -> Result<()> {
        self.with_deadline("deregister", async {
            let cluster = self.store.find_by_name(&request.name).await?;
            if cluster.is_static {
                return Err(SchedulerError::invalid(format!(
                    "cluster {} is static and cannot be deregistered",
                    request.name
                )));
            }

            let removed = if request.force {
                self.store.hard_delete(&request.name).await?
            } else {
                self.store.soft_delete(&request.name).await?
            };

            // Lost a race with another deregister.
            if !removed {
                return Err(SchedulerError::NotFound(request.name.clone()));
            }
            Ok(())
        })
        .await?;

        ServiceMetrics::incr(&self.metrics.deregistrations);
        info!(cluster = %request.name, force = request.force, "Cluster deregistered");
        Ok(())
    }

    /// Lists every visible cluster.
    pub async fn list(&self) -> Result<Vec<ClusterStatus>> {
        let clusters = self.with_deadline("list", self.store.list()).await?;
        Ok(clusters.iter().map(Cluster::status).collect())
    }

    /// Gets one visible cluster.
    pub async fn get(&self, name: &str) -> Result<ClusterStatus> {
        let cluster = self
            .with_deadline("get", self.store.find_by_name(name))
            .await?;
        Ok(cluster.status())
    }

    /// Evaluates admission for a workload against every available cluster.
    pub async fn admission(&self, workload: &Workload) -> Result<AdmissionReport> {
        let filter = ClusterFilter::new().with_state(ClusterState::Available);
        let snapshot = self
            .with_deadline("admission", self.store.list_filtered(&filter))
            .await?;

        let outcome = admission::evaluate(&snapshot, workload);
        Ok(AdmissionReport {
            eligible: outcome.eligible_names(),
            rejected: outcome.rejected,
        })
    }

    /// Picks one cluster for a workload from a single registry snapshot.
    pub async fn schedule(&self, workload: &Workload) -> Result<Placement> {
        let filter = ClusterFilter::new().with_state(ClusterState::Available);
        let snapshot = self
            .with_deadline("schedule", self.store.list_filtered(&filter))
            .await?;

        let outcome = admission::evaluate(&snapshot, workload);
        match self.placement.select(&outcome.eligible) {
            Some(cluster) => {
                ServiceMetrics::incr(&self.metrics.placements);
                debug!(
                    cluster = %cluster,
                    candidates = snapshot.len(),
                    rejected = outcome.rejected.len(),
                    algorithm = self.placement.name(),
                    "Workload placed"
                );
                Ok(Placement {
                    cluster,
                    rejections: outcome.rejected,
                })
            }
            None => {
                ServiceMetrics::incr(&self.metrics.no_capacity);
                warn!(
                    candidates = snapshot.len(),
                    rejected = outcome.rejected.len(),
                    "No cluster can take the workload"
                );
                Err(SchedulerError::NoCapacity {
                    rejections: outcome.rejected,
                })
            }
        }
    }

    /// Upserts clusters defined in configuration.
    ///
    /// Existing rows with the same name are replaced, so configuration
    /// always wins over runtime updates after a restart.
    pub async fn seed_static(&self, clusters: &[StaticCluster]) -> Result<()> {
        for entry in clusters {
            validate_name(&entry.name)?;
            validate_url(&entry.url)?;
            if entry.score > entry.max_score {
                return Err(SchedulerError::invalid(format!(
                    "static cluster {}: score {} exceeds max_score {}",
                    entry.name, entry.score, entry.max_score
                )));
            }

            let mut cluster = Cluster::new(entry.name.clone(), entry.url.clone());
            cluster.tls = entry.tls.clone().map(TlsMaterial::from);
            cluster.state = entry.state;
            cluster.score = entry.score;
            cluster.max_score = entry.max_score;
            cluster.govern = entry.govern;
            cluster.admission_constraints = dedup_constraints(entry.admission_constraints.clone());
            cluster.region = entry.region.clone();
            cluster.is_static = true;

            self.with_deadline("seed_static", self.store.upsert(&cluster))
                .await?;
            info!(cluster = %cluster.name, state = %cluster.state, "Static cluster seeded");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClusterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterService")
            .field("algorithm", &self.placement.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Cluster names appear in URL paths, so they are restricted to a
/// DNS-label-like alphabet.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 253 {
        return Err(SchedulerError::invalid(
            "cluster name must be 1-253 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(SchedulerError::invalid(format!(
            "cluster name {name:?} contains invalid characters"
        )));
    }
    if name.chars().all(|c| c == '.') {
        return Err(SchedulerError::invalid(format!(
            "cluster name {name:?} is a relative path segment"
        )));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| SchedulerError::invalid(format!("invalid cluster url {url:?}: {e}")))?;
    if parsed.host_str().is_none() {
        return Err(SchedulerError::invalid(format!(
            "cluster url {url:?} has no host"
        )));
    }
    Ok(())
}
