//! Placement algorithms for cluster selection.

use std::cmp::Ordering;

use corral_proto::score;

use crate::types::ClusterSummary;

/// Trait for placement algorithms.
pub trait PlacementAlgorithm: Send + Sync {
    /// Selects one cluster from the candidates that passed admission.
    ///
    /// Returns `None` if no suitable cluster is available. Implementations
    /// must be read-only and deterministic for a given input.
    fn select(&self, clusters: &[&ClusterSummary]) -> Option<String>;

    /// Returns the algorithm name.
    fn name(&self) -> &'static str;
}

/// Highest-score placement.
///
/// Ignores clusters that are not `available` or whose score is zero, then
/// picks the highest `score`. Ties go to the higher `max_score`, then to
/// the lexicographically smallest name.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreScheduler;

impl ScoreScheduler {
    /// Creates a new score scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Orders clusters so that the preferred one compares greatest.
    fn preference(a: &ClusterSummary, b: &ClusterSummary) -> Ordering {
        a.score
            .cmp(&b.score)
            .then(a.max_score.cmp(&b.max_score))
            .then_with(|| b.name.cmp(&a.name))
    }
}

impl PlacementAlgorithm for ScoreScheduler {
    fn select(&self, clusters: &[&ClusterSummary]) -> Option<String> {
        clusters
            .iter()
            .filter(|c| c.state.accepts_workloads() && c.score > score::UNSCHEDULABLE)
            .max_by(|a, b| Self::preference(a, b))
            .map(|c| c.name.clone())
    }

    fn name(&self) -> &'static str {
        "score"
    }
}
