//! In-memory cluster store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Result, SchedulerError};
use crate::types::{is_visible, Cluster, ClusterMutation, ClusterSummary};

use super::{ClusterFilter, ClusterStore};

/// In-memory cluster store.
///
/// Data is lost when the process exits. Per-name atomicity comes from the
/// dashmap shard lock held by `entry` and `get_mut`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    clusters: DashMap<String, Cluster>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical rows, including soft-deleted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns true if the store holds no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn insert(&self, cluster: &Cluster) -> Result<()> {
        match self.clusters.entry(cluster.name.clone()) {
            Entry::Occupied(mut existing) => {
                if is_visible(existing.get()) {
                    return Err(SchedulerError::AlreadyExists(cluster.name.clone()));
                }
                existing.insert(cluster.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(cluster.clone());
            }
        }
        Ok(())
    }

    async fn upsert(&self, cluster: &Cluster) -> Result<()> {
        self.clusters.insert(cluster.name.clone(), cluster.clone());
        Ok(())
    }

    async fn find_raw(&self, name: &str) -> Result<Option<Cluster>> {
        Ok(self.clusters.get(name).map(|r| r.value().clone()))
    }

    async fn soft_delete(&self, name: &str) -> Result<bool> {
        Ok(match self.clusters.get_mut(name) {
            Some(mut cluster) if is_visible(&cluster) => {
                cluster.deleted = true;
                true
            }
            _ => false,
        })
    }

    async fn hard_delete(&self, name: &str) -> Result<bool> {
        Ok(self.clusters.remove(name).is_some())
    }

    async fn apply(&self, name: &str, mutation: &ClusterMutation) -> Result<Cluster> {
        let mut cluster = self
            .clusters
            .get_mut(name)
            .filter(|c| is_visible(c))
            .ok_or_else(|| SchedulerError::NotFound(name.to_owned()))?;

        cluster.apply(mutation)?;
        Ok(cluster.clone())
    }

    async fn list_filtered(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
        let mut results: Vec<_> = self
            .clusters
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().summary())
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn list(&self) -> Result<Vec<Cluster>> {
        let mut results: Vec<_> = self
            .clusters
            .iter()
            .filter(|r| is_visible(r.value()))
            .map(|r| r.value().clone())
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn purge_deleted(&self, limit: u32) -> Result<u64> {
        #[allow(clippy::as_conversions)]
        let candidates: Vec<String> = self
            .clusters
            .iter()
            .filter(|r| r.value().deleted)
            .take(limit as usize)
            .map(|r| r.key().clone())
            .collect();

        let mut purged = 0;
        for name in candidates {
            // A concurrent insert may have resurrected the row in between.
            if self.clusters.remove_if(&name, |_, c| c.deleted).is_some() {
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use corral_proto::{AdmissionConstraint, ClusterState};
    use std::sync::Arc;

    #[tokio::test]
    async fn insert_and_find() {
        let store = MemoryStore::new();
        let cluster = Cluster::new("eu-1", "https://eu-1");

        store.insert(&cluster).await.unwrap();

        let found = store.find_by_name("eu-1").await.unwrap();
        assert_eq!(found, cluster);
    }

    #[tokio::test]
    async fn insert_live_name_fails() {
        let store = MemoryStore::new();
        store.insert(&Cluster::new("eu-1", "https://a")).await.unwrap();

        let err = store
            .insert(&Cluster::new("eu-1", "https://b"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyExists(name) if name == "eu-1"));
        assert_eq!(store.find_by_name("eu-1").await.unwrap().url, "https://a");
    }

    #[tokio::test]
    async fn insert_resurrects_soft_deleted() {
        let store = MemoryStore::new();
        store.insert(&Cluster::new("eu-1", "https://a")).await.unwrap();
        assert!(store.soft_delete("eu-1").await.unwrap());

        store.insert(&Cluster::new("eu-1", "https://b")).await.unwrap();

        let found = store.find_by_name("eu-1").await.unwrap();
        assert_eq!(found.url, "https://b");
        assert!(!found.deleted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_have_one_winner() {
        let store = Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .insert(&Cluster::new("race", format!("https://{i}")))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut exists = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(SchedulerError::AlreadyExists(_)) => exists += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(exists, 15);
    }

    #[tokio::test]
    async fn soft_delete_hides_but_keeps_row() {
        let store = MemoryStore::new();
        store.insert(&Cluster::new("eu-1", "https://a")).await.unwrap();

        assert!(store.soft_delete("eu-1").await.unwrap());
        assert!(!store.soft_delete("eu-1").await.unwrap());

        assert!(matches!(
            store.find_by_name("eu-1").await,
            Err(SchedulerError::NotFound(_))
        ));
        assert!(store.find_raw("eu-1").await.unwrap().unwrap().deleted);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_on_deleted_is_not_found() {
        let store = MemoryStore::new();
        store.insert(&Cluster::new("eu-1", "https://a")).await.unwrap();
        store.soft_delete("eu-1").await.unwrap();

        let err = store
            .apply("eu-1", &ClusterMutation::Cordoned(true))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound(_)));
    }

    #[tokio::test]
    async fn apply_failure_leaves_row_unchanged() {
        let store = MemoryStore::new();
        store.insert(&Cluster::new("eu-1", "https://a")).await.unwrap();

        store
            .apply("eu-1", &ClusterMutation::Score(101))
            .await
            .unwrap_err();

        assert_eq!(store.find_by_name("eu-1").await.unwrap().score, 50);
    }

    #[tokio::test]
    async fn list_filtered_projects_and_orders() {
        let store = MemoryStore::new();
        let mut b = Cluster::new("b", "https://b");
        b.admission_constraints = vec![AdmissionConstraint::HasFeaturePreview];
        let mut a = Cluster::new("a", "https://a");
        a.state = ClusterState::Cordoned;
        store.insert(&b).await.unwrap();
        store.insert(&a).await.unwrap();

        let all = store.list_filtered(&ClusterFilter::new()).await.unwrap();
        let names: Vec<_> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(all[1].admission_constraints, b.admission_constraints);

        let available = store
            .list_filtered(&ClusterFilter::new().with_state(ClusterState::Available))
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name, "b");
    }

    #[tokio::test]
    async fn purge_only_removes_deleted_rows() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store.insert(&Cluster::new(name, "https://x")).await.unwrap();
        }
        store.soft_delete("a").await.unwrap();
        store.soft_delete("b").await.unwrap();

        assert_eq!(store.purge_deleted(1).await.unwrap(), 1);
        assert_eq!(store.purge_deleted(10).await.unwrap(), 1);
        assert_eq!(store.purge_deleted(10).await.unwrap(), 0);

        assert_eq!(store.len(), 1);
        assert!(store.find_by_name("c").await.is_ok());
    }
}
