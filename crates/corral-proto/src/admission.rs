//! Admission constraints and workload descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A predicate a workload must satisfy before a cluster accepts it.
///
/// Serialised with an internal `type` tag:
///
/// ```json
/// {"type": "has_permission", "permission": "admin-clusters"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdmissionConstraint {
    /// The user has opted into feature previews.
    HasFeaturePreview,
    /// The user holds the named permission.
    HasPermission {
        /// Permission identifier.
        permission: String,
    },
    /// The user is at or above the given level.
    HasUserLevel {
        /// Minimum level.
        level: UserLevel,
    },
    /// The workload asks for above-baseline resources.
    HasMoreResources,
}

impl fmt::Display for AdmissionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasFeaturePreview => write!(f, "has-feature-preview"),
            Self::HasPermission { permission } => write!(f, "has-permission({permission})"),
            Self::HasUserLevel { level } => write!(f, "has-user-level({level})"),
            Self::HasMoreResources => write!(f, "has-more-resources"),
        }
    }
}

/// User level ladder used by [`AdmissionConstraint::HasUserLevel`].
///
/// Levels are totally ordered: `free < standard < professional < enterprise`.
/// Any other string is rejected when parsed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UserLevel {
    /// No paid plan.
    #[default]
    Free,
    /// Entry paid plan.
    Standard,
    /// Professional plan.
    Professional,
    /// Enterprise plan.
    Enterprise,
}

impl UserLevel {
    /// All levels in ascending order.
    pub const LADDER: [Self; 4] = [
        Self::Free,
        Self::Standard,
        Self::Professional,
        Self::Enterprise,
    ];

    /// Returns the level name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Standard => "standard",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for UserLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a level outside the ladder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown user level: {0}")]
pub struct UnknownUserLevel(pub String);

impl FromStr for UserLevel {
    type Err = UnknownUserLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::LADDER
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownUserLevel(s.to_owned()))
    }
}

/// Capabilities of a workload asking to be placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workload {
    /// The user opted into feature previews.
    pub feature_preview: bool,
    /// Permissions held by the user.
    pub permissions: Vec<String>,
    /// The user's level.
    pub user_level: UserLevel,
    /// The workload needs above-baseline resources.
    pub more_resources: bool,
}

impl Workload {
    /// Creates a workload with no capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the workload as opted into feature previews.
    #[must_use]
    pub const fn with_feature_preview(mut self) -> Self {
        self.feature_preview = true;
        self
    }

    /// Adds a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Sets the user level.
    #[must_use]
    pub const fn with_user_level(mut self, level: UserLevel) -> Self {
        self.user_level = level;
        self
    }

    /// Marks the workload as needing more resources.
    #[must_use]
    pub const fn with_more_resources(mut self) -> Self {
        self.more_resources = true;
        self
    }

    /// Returns true if the workload holds the permission.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Why a cluster refused a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Cluster name.
    pub cluster: String,
    /// First constraint the workload failed.
    pub constraint: AdmissionConstraint,
    /// Human-readable explanation.
    pub reason: String,
}

/// Outcome of a successful scheduling request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Selected cluster.
    pub cluster: String,
    /// Clusters that refused the workload on the way.
    #[serde(default)]
    pub rejections: Vec<Rejection>,
}

/// Admission diagnostics for a workload against every available cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionReport {
    /// Names of clusters that would admit the workload, in name order.
    pub eligible: Vec<String>,
    /// Clusters that refused, with the first failing constraint.
    pub rejected: Vec<Rejection>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn user_level_ladder_is_ordered() {
        assert!(UserLevel::Free < UserLevel::Standard);
        assert!(UserLevel::Standard < UserLevel::Professional);
        assert!(UserLevel::Professional < UserLevel::Enterprise);
    }

    #[test]
    fn user_level_parse() {
        assert_eq!("professional".parse::<UserLevel>(), Ok(UserLevel::Professional));
        assert_eq!(
            "gold".parse::<UserLevel>(),
            Err(UnknownUserLevel("gold".to_owned()))
        );
    }

    #[test]
    fn constraint_json_shape() {
        let constraint = AdmissionConstraint::HasPermission {
            permission: "admin".into(),
        };
        let json = serde_json::to_value(&constraint).unwrap();
        assert_eq!(json["type"], "has_permission");
        assert_eq!(json["permission"], "admin");

        let level: AdmissionConstraint =
            serde_json::from_str(r#"{"type":"has_user_level","level":"standard"}"#).unwrap();
        assert_eq!(
            level,
            AdmissionConstraint::HasUserLevel {
                level: UserLevel::Standard
            }
        );
    }

    #[test]
    fn unknown_level_fails_to_deserialise() {
        let result: Result<AdmissionConstraint, _> =
            serde_json::from_str(r#"{"type":"has_user_level","level":"platinum"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn workload_builder() {
        let workload = Workload::new()
            .with_permission("a")
            .with_user_level(UserLevel::Enterprise)
            .with_more_resources();

        assert!(workload.has_permission("a"));
        assert!(!workload.has_permission("b"));
        assert!(!workload.feature_preview);
        assert!(workload.more_resources);
    }
}
