//! Cluster lifecycle messages.
//!
//! - **Agent → Registry**: register, update, deregister
//! - **Orchestrator → Registry**: list

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::admission::AdmissionConstraint;

/// Operational state of a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    /// Accepting new workloads.
    #[default]
    Available,
    /// Refusing new workloads; existing ones keep running.
    Cordoned,
    /// Evicting existing workloads; refusing new ones.
    Draining,
}

impl ClusterState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Cordoned => "cordoned",
            Self::Draining => "draining",
        }
    }

    /// Returns true if new workloads may be admitted.
    #[must_use]
    pub const fn accepts_workloads(self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "cordoned" => Ok(Self::Cordoned),
            "draining" => Ok(Self::Draining),
            _ => Err(format!("unknown cluster state: {s}")),
        }
    }
}

/// Mutual-TLS material for calling a cluster.
///
/// The key travels in plain text on the wire; the registry wraps it in a
/// secret type as soon as it is received.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// CA certificate (PEM).
    pub ca: String,
    /// Client certificate (PEM).
    pub crt: String,
    /// Client private key (PEM).
    pub key: String,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca", &self.ca)
            .field("crt", &self.crt)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// How strongly the scheduler should prefer a new cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preferability {
    /// Neutral.
    #[default]
    None,
    /// Prefer over neutral clusters.
    Prefer,
    /// Never picked while the score stays at zero.
    DontSchedule,
}

impl Preferability {
    /// Initial score for this preferability.
    #[must_use]
    pub const fn initial_score(self) -> u32 {
        match self {
            Self::None => crate::score::NEUTRAL,
            Self::Prefer => crate::score::PREFERRED,
            Self::DontSchedule => crate::score::UNSCHEDULABLE,
        }
    }
}

/// Hints seeding the initial state of a registered cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationHints {
    /// Initial scheduling preference.
    pub preferability: Preferability,
    /// Register in the cordoned state.
    pub cordoned: bool,
    /// This registry governs the cluster's lifecycle.
    pub govern: bool,
}

/// Cluster registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Unique cluster name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Optional mutual-TLS material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Optional hints for the initial state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hints: Option<RegistrationHints>,
    /// Constraints gating admission.
    #[serde(default)]
    pub admission_constraints: Vec<AdmissionConstraint>,
    /// Optional locality hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl RegisterRequest {
    /// Creates a registration request with the required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            tls: None,
            hints: None,
            admission_constraints: Vec::new(),
            region: None,
        }
    }

    /// Sets the TLS material.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the registration hints.
    #[must_use]
    pub const fn with_hints(mut self, hints: RegistrationHints) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Adds an admission constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: AdmissionConstraint) -> Self {
        self.admission_constraints.push(constraint);
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Adds or removes a single admission constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDelta {
    /// `true` adds, `false` removes.
    pub add: bool,
    /// The constraint.
    pub constraint: AdmissionConstraint,
}

/// The single property an update changes.
///
/// Externally tagged, so the JSON body carries exactly one key:
///
/// ```json
/// {"score": 40}
/// {"admission_constraint": {"add": true, "constraint": {"type": "has_feature_preview"}}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateProperty {
    /// New score.
    Score(u32),
    /// New score ceiling.
    MaxScore(u32),
    /// Cordon or uncordon.
    Cordoned(bool),
    /// Add or remove one admission constraint.
    AdmissionConstraint(ConstraintDelta),
}

/// Cluster update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Cluster name.
    pub name: String,
    /// The property to change.
    pub property: UpdateProperty,
}

impl UpdateRequest {
    /// Creates an update request.
    #[must_use]
    pub fn new(name: impl Into<String>, property: UpdateProperty) -> Self {
        Self {
            name: name.into(),
            property,
        }
    }
}

/// Cluster deregistration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterRequest {
    /// Cluster name.
    pub name: String,
    /// Delete the row immediately instead of marking it deleted.
    #[serde(default)]
    pub force: bool,
}

/// Cluster status as reported by `List`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Cluster name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Operational state.
    pub state: ClusterState,
    /// Current score.
    pub score: u32,
    /// Score ceiling.
    pub max_score: u32,
    /// This registry governs the cluster.
    pub governed: bool,
    /// Admission constraints in evaluation order.
    pub admission_constraints: Vec<AdmissionConstraint>,
    /// Defined in configuration rather than registered at runtime.
    #[serde(rename = "static")]
    pub is_static: bool,
    /// Locality hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}
