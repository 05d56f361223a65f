//! Wire types for the Corral cluster registry.
//!
//! These types are shared by the registry service and its callers:
//!
//! - **Cluster agents** register their cluster, push score and cordon
//!   updates, and deregister on teardown.
//! - **Orchestrators** list cluster status and request placements for
//!   workloads.
//!
//! Every type here is plain serde data. Requests map one-to-one onto the
//! lifecycle operations `Register`, `Update`, `Deregister` and `List`.
//!
//! # Example
//!
//! ```
//! use corral_proto::{AdmissionConstraint, RegisterRequest, UpdateProperty, UpdateRequest};
//!
//! let register = RegisterRequest::new("eu-1", "https://ws-eu-1.example.com")
//!     .with_region("europe")
//!     .with_constraint(AdmissionConstraint::HasPermission {
//!         permission: "new-workspace-cluster".into(),
//!     });
//!
//! let update = UpdateRequest::new("eu-1", UpdateProperty::Cordoned(true));
//! # let _ = (register, update);
//! ```

mod admission;
mod cluster;
mod error;

pub use admission::{
    AdmissionConstraint, AdmissionReport, Placement, Rejection, UnknownUserLevel, UserLevel,
    Workload,
};
pub use cluster::{
    ClusterState, ClusterStatus, ConstraintDelta, DeregisterRequest, Preferability,
    RegisterRequest, RegistrationHints, TlsConfig, UpdateProperty, UpdateRequest,
};
pub use error::{ErrorBody, ErrorCode};

/// Score bounds applied at registration time.
pub mod score {
    /// Default ceiling for a newly registered cluster.
    pub const DEFAULT_MAX: u32 = 100;

    /// Initial score for [`Preferability::Prefer`](crate::Preferability::Prefer).
    pub const PREFERRED: u32 = 100;

    /// Initial score for [`Preferability::None`](crate::Preferability::None).
    pub const NEUTRAL: u32 = 50;

    /// Initial score for [`Preferability::DontSchedule`](crate::Preferability::DontSchedule).
    /// Clusters at this score are never selected for placement.
    pub const UNSCHEDULABLE: u32 = 0;
}
