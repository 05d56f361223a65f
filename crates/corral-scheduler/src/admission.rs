//! Admission control.
//!
//! A cluster admits a workload only if the workload satisfies every one of
//! the cluster's admission constraints. Constraints are checked in list
//! order and evaluation stops at the first failure, which is reported as a
//! [`ConstraintViolation`]. A cluster with no constraints admits anything.

use corral_proto::{AdmissionConstraint, Rejection, Workload};

use crate::types::ClusterSummary;

/// Why one cluster refused a workload.
pub type ConstraintViolation = Rejection;

/// Result of evaluating a workload against a set of clusters.
#[derive(Debug, Clone, Default)]
pub struct AdmissionOutcome<'a> {
    /// Clusters admitting the workload, in input order.
    pub eligible: Vec<&'a ClusterSummary>,
    /// Clusters refusing the workload, in input order.
    pub rejected: Vec<ConstraintViolation>,
}

impl AdmissionOutcome<'_> {
    /// Names of the eligible clusters.
    #[must_use]
    pub fn eligible_names(&self) -> Vec<String> {
        self.eligible.iter().map(|c| c.name.clone()).collect()
    }
}

/// Checks a single constraint. `Err` carries the human-readable reason.
fn check(constraint: &AdmissionConstraint, workload: &Workload) -> Result<(), String> {
    match constraint {
        AdmissionConstraint::HasFeaturePreview => {
            if workload.feature_preview {
                Ok(())
            } else {
                Err("workload has not opted into feature previews".to_owned())
            }
        }
        AdmissionConstraint::HasPermission { permission } => {
            if workload.has_permission(permission) {
                Ok(())
            } else {
                Err(format!("missing permission '{permission}'"))
            }
        }
        AdmissionConstraint::HasUserLevel { level } => {
            if workload.user_level >= *level {
                Ok(())
            } else {
                Err(format!(
                    "user level '{}' is below required '{level}'",
                    workload.user_level
                ))
            }
        }
        AdmissionConstraint::HasMoreResources => {
            if workload.more_resources {
                Ok(())
            } else {
                Err("cluster only admits workloads requesting more resources".to_owned())
            }
        }
    }
}

/// Decides whether one cluster admits the workload.
pub fn admit(cluster: &ClusterSummary, workload: &Workload) -> Result<(), ConstraintViolation> {
    for constraint in &cluster.admission_constraints {
        check(constraint, workload).map_err(|reason| ConstraintViolation {
            cluster: cluster.name.clone(),
            constraint: constraint.clone(),
            reason,
        })?;
    }
    Ok(())
}

/// Partitions clusters into eligible and rejected, preserving input order.
///
/// Ineligibility is never an error; the caller decides what an empty
/// `eligible` list means.
pub fn evaluate<'a>(clusters: &'a [ClusterSummary], workload: &Workload) -> AdmissionOutcome<'a> {
    let mut outcome = AdmissionOutcome::default();
    for cluster in clusters {
        match admit(cluster, workload) {
            Ok(()) => outcome.eligible.push(cluster),
            Err(violation) => outcome.rejected.push(violation),
        }
    }
    outcome
}
