//! Cluster records and the mutations applied to them.

use chrono::{DateTime, Utc};
use corral_proto::{
    AdmissionConstraint, ClusterState, ClusterStatus, ConstraintDelta, TlsConfig, UpdateProperty,
};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::error::{Result, SchedulerError};

/// Mutual-TLS material held by the registry.
///
/// The private key is kept as a [`SecretString`] and never appears in
/// `Debug` output.
#[derive(Clone)]
pub struct TlsMaterial {
    /// CA certificate (PEM).
    pub ca: String,
    /// Client certificate (PEM).
    pub crt: String,
    key: SecretString,
}

impl TlsMaterial {
    /// Creates TLS material.
    #[must_use]
    pub fn new(ca: impl Into<String>, crt: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            ca: ca.into(),
            crt: crt.into(),
            key: SecretString::from(key.into()),
        }
    }

    /// Exposes the private key.
    ///
    /// Only call this when building a TLS connector or persisting the row.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.expose_secret()
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca", &self.ca)
            .field("crt", &self.crt)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for TlsMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.ca == other.ca && self.crt == other.crt && self.key() == other.key()
    }
}

impl Eq for TlsMaterial {}

impl From<TlsConfig> for TlsMaterial {
    fn from(tls: TlsConfig) -> Self {
        Self::new(tls.ca, tls.crt, tls.key)
    }
}

/// A registered cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Unique name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Mutual-TLS material; `None` means plaintext.
    pub tls: Option<TlsMaterial>,
    /// Operational state.
    pub state: ClusterState,
    /// Current score, never above `max_score`.
    pub score: u32,
    /// Score ceiling.
    pub max_score: u32,
    /// This registry governs the cluster.
    pub govern: bool,
    /// Admission constraints, ordered and free of duplicates.
    pub admission_constraints: Vec<AdmissionConstraint>,
    /// Locality hint.
    pub region: Option<String>,
    /// Seeded from configuration.
    pub is_static: bool,
    /// Soft-delete marker.
    pub deleted: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    /// Creates an available cluster with a neutral score.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            tls: None,
            state: ClusterState::Available,
            score: corral_proto::score::NEUTRAL,
            max_score: corral_proto::score::DEFAULT_MAX,
            govern: false,
            admission_constraints: Vec::new(),
            region: None,
            is_static: false,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    /// Projects the scheduling metadata, leaving TLS material behind.
    #[must_use]
    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            name: self.name.clone(),
            url: self.url.clone(),
            score: self.score,
            max_score: self.max_score,
            state: self.state,
            govern: self.govern,
            admission_constraints: self.admission_constraints.clone(),
        }
    }

    /// Converts to the status reported by `List`.
    #[must_use]
    pub fn status(&self) -> ClusterStatus {
        ClusterStatus {
            name: self.name.clone(),
            url: self.url.clone(),
            state: self.state,
            score: self.score,
            max_score: self.max_score,
            governed: self.govern,
            admission_constraints: self.admission_constraints.clone(),
            is_static: self.is_static,
            region: self.region.clone(),
        }
    }

    /// Applies a mutation in place.
    ///
    /// Nothing is changed when an error is returned. Both stores call this
    /// while holding the row lock, so concurrent updates to one cluster are
    /// serialised.
    pub fn apply(&mut self, mutation: &ClusterMutation) -> Result<()> {
        match mutation {
            ClusterMutation::Score(score) => {
                if *score > self.max_score {
                    return Err(SchedulerError::invalid(format!(
                        "score {score} exceeds max_score {}",
                        self.max_score
                    )));
                }
                self.score = *score;
            }
            ClusterMutation::MaxScore(max_score) => {
                if *max_score < self.score {
                    return Err(SchedulerError::invalid(format!(
                        "max_score {max_score} is below score {}",
                        self.score
                    )));
                }
                self.max_score = *max_score;
            }
            ClusterMutation::Cordoned(cordoned) => {
                let to = if *cordoned {
                    ClusterState::Cordoned
                } else {
                    ClusterState::Available
                };
                if self.state == ClusterState::Draining {
                    return Err(SchedulerError::InvalidStateTransition {
                        from: self.state,
                        to,
                    });
                }
                self.state = to;
            }
            ClusterMutation::Drain => self.state = ClusterState::Draining,
            ClusterMutation::AddConstraint(constraint) => {
                if !self.admission_constraints.contains(constraint) {
                    self.admission_constraints.push(constraint.clone());
                }
            }
            ClusterMutation::RemoveConstraint(constraint) => {
                self.admission_constraints.retain(|c| c != constraint);
            }
        }
        Ok(())
    }
}

/// Single visibility predicate shared by every read path.
#[must_use]
pub const fn is_visible(cluster: &Cluster) -> bool {
    !cluster.deleted
}

/// Removes repeated constraints, keeping the first occurrence.
#[must_use]
pub fn dedup_constraints(constraints: Vec<AdmissionConstraint>) -> Vec<AdmissionConstraint> {
    let mut out: Vec<AdmissionConstraint> = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        if !out.contains(&constraint) {
            out.push(constraint);
        }
    }
    out
}

/// Scheduling metadata for a cluster, without TLS material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    /// Cluster name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Current score.
    pub score: u32,
    /// Score ceiling.
    pub max_score: u32,
    /// Operational state.
    pub state: ClusterState,
    /// This registry governs the cluster.
    pub govern: bool,
    /// Admission constraints in evaluation order.
    pub admission_constraints: Vec<AdmissionConstraint>,
}

/// A single change to a cluster row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterMutation {
    /// Set the score.
    Score(u32),
    /// Set the score ceiling.
    MaxScore(u32),
    /// Cordon (`true`) or uncordon (`false`).
    Cordoned(bool),
    /// Start draining.
    Drain,
    /// Add a constraint if absent.
    AddConstraint(AdmissionConstraint),
    /// Remove a constraint if present.
    RemoveConstraint(AdmissionConstraint),
}

impl From<UpdateProperty> for ClusterMutation {
    fn from(property: UpdateProperty) -> Self {
        match property {
            UpdateProperty::Score(score) => Self::Score(score),
            UpdateProperty::MaxScore(max_score) => Self::MaxScore(max_score),
            UpdateProperty::Cordoned(cordoned) => Self::Cordoned(cordoned),
            UpdateProperty::AdmissionConstraint(ConstraintDelta { add: true, constraint }) => {
                Self::AddConstraint(constraint)
            }
            UpdateProperty::AdmissionConstraint(ConstraintDelta {
                add: false,
                constraint,
            }) => Self::RemoveConstraint(constraint),
        }
    }
}
