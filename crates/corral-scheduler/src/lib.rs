//! Corral scheduler - workspace cluster registry with scored admission control.
//!
//! The scheduler is responsible for:
//!
//! - **Cluster registry**: durable records of execution clusters, their
//!   state (available, cordoned, draining), TLS material and scores
//! - **Admission control**: deciding which clusters accept a workload
//! - **Placement**: picking exactly one cluster by score
//! - **Lifecycle**: register, update, deregister and drain, with the
//!   service as the only writer of the registry
//!
//! # Architecture
//!
//! Cluster agents call the HTTP API to register and update their cluster.
//! Scheduling requests take one snapshot of available clusters, run
//! admission over it, and hand the survivors to the placement algorithm.
//! A background sweeper purges soft-deleted rows.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use corral_proto::{RegisterRequest, Workload};
//! use corral_scheduler::{ClusterService, MemoryStore, ScoreScheduler};
//!
//! # async fn example() -> corral_scheduler::Result<()> {
//! let service = ClusterService::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ScoreScheduler::new()),
//!     Duration::from_secs(10),
//! );
//! service
//!     .register(RegisterRequest::new("eu-1", "https://eu-1.example.com"))
//!     .await?;
//! let placement = service.schedule(&Workload::new()).await?;
//! assert_eq!(placement.cluster, "eu-1");
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod placement;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod types;

// Re-export main types
pub use admission::{AdmissionOutcome, ConstraintViolation};
pub use client::ClusterClient;
pub use config::{SchedulerConfig, StorageBackend};
pub use error::{Result, SchedulerError};
pub use placement::{PlacementAlgorithm, ScoreScheduler};
pub use service::ClusterService;
pub use store::{ClusterFilter, ClusterStore, MemoryStore, PostgresStore};
pub use sweeper::Sweeper;
pub use types::{is_visible, Cluster, ClusterMutation, ClusterSummary, TlsMaterial};
