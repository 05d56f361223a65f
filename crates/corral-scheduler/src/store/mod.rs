//! Cluster storage backends.
//!
//! The registry is the only durable state in the system. PostgreSQL backs
//! production deployments; the in-memory store serves tests and single-node
//! setups where losing registrations on restart is acceptable.
//!
//! Every read path filters rows through [`is_visible`]. Soft-deleted rows
//! stay in the table until [`ClusterStore::purge_deleted`] removes them.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use corral_proto::ClusterState;

use crate::error::Result;
use crate::types::{is_visible, Cluster, ClusterMutation, ClusterSummary};

/// Filter criteria for listing clusters.
///
/// Deleted clusters are always excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterFilter {
    /// Filter by state.
    pub state: Option<ClusterState>,
    /// Minimum score, inclusive.
    pub min_score: Option<u32>,
    /// Filter by region.
    pub region: Option<String>,
    /// Filter by exact URL.
    pub url: Option<String>,
}

impl ClusterFilter {
    /// Create a new empty filter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: None,
            min_score: None,
            region: None,
            url: None,
        }
    }

    /// Filter by state.
    #[must_use]
    pub const fn with_state(mut self, state: ClusterState) -> Self {
        self.state = Some(state);
        self
    }

    /// Filter by minimum score.
    #[must_use]
    pub const fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Filter by region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Filter by exact URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns true if the cluster is visible and passes every criterion.
    #[must_use]
    pub fn matches(&self, cluster: &Cluster) -> bool {
        if !is_visible(cluster) {
            return false;
        }
        if let Some(state) = self.state {
            if cluster.state != state {
                return false;
            }
        }
        if let Some(min_score) = self.min_score {
            if cluster.score < min_score {
                return false;
            }
        }
        if let Some(ref region) = self.region {
            if cluster.region.as_ref() != Some(region) {
                return false;
            }
        }
        if let Some(ref url) = self.url {
            if &cluster.url != url {
                return false;
            }
        }
        true
    }
}

/// Backend for storing cluster records.
///
/// Backend failures surface as
/// [`SchedulerError::StorageUnavailable`](crate::SchedulerError::StorageUnavailable).
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Insert a new cluster.
    ///
    /// Fails with `AlreadyExists` if a live cluster has the same name. A
    /// soft-deleted row with that name is replaced. The check and the write
    /// are a single atomic step.
    async fn insert(&self, cluster: &Cluster) -> Result<()>;

    /// Insert or fully replace the row keyed by name, including its
    /// `deleted` flag.
    async fn upsert(&self, cluster: &Cluster) -> Result<()>;

    /// Get a visible cluster by name.
    ///
    /// Returns `NotFound` for unknown and soft-deleted names.
    async fn find_by_name(&self, name: &str) -> Result<Cluster> {
        self.find_raw(name)
            .await?
            .filter(is_visible)
            .ok_or_else(|| crate::SchedulerError::NotFound(name.to_owned()))
    }

    /// Get the physical row, deleted or not.
    async fn find_raw(&self, name: &str) -> Result<Option<Cluster>>;

    /// Mark a cluster deleted.
    ///
    /// Returns true if a live row was marked; repeated calls return false.
    async fn soft_delete(&self, name: &str) -> Result<bool>;

    /// Physically remove a row, deleted or not.
    async fn hard_delete(&self, name: &str) -> Result<bool>;

    /// Apply one mutation to a visible cluster under its row lock and
    /// return the updated record.
    async fn apply(&self, name: &str, mutation: &ClusterMutation) -> Result<Cluster>;

    /// List scheduling metadata for visible clusters matching the filter,
    /// ordered by name.
    async fn list_filtered(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>>;

    /// List every visible cluster, ordered by name.
    async fn list(&self) -> Result<Vec<Cluster>>;

    /// Physically remove up to `limit` soft-deleted rows.
    ///
    /// Live rows are never touched.
    async fn purge_deleted(&self, limit: u32) -> Result<u64>;
}
