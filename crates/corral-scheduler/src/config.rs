//! Configuration types for the scheduler.

use corral_proto::{AdmissionConstraint, ClusterState, TlsConfig};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SchedulerError};

/// Environment variable prefix. Nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "CORRAL_";

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "scheduler.toml";

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// HTTP API configuration.
    pub api: ApiConfig,
    /// Cluster store configuration.
    pub storage: StorageConfig,
    /// Per-request limits.
    pub requests: RequestConfig,
    /// Soft-delete sweeper configuration.
    pub sweeper: SweeperConfig,
    /// Clusters defined in configuration rather than registered at runtime.
    pub static_clusters: Vec<StaticCluster>,
}

impl SchedulerConfig {
    /// Load configuration from `scheduler.toml` and `CORRAL_` environment
    /// variables, later sources overriding earlier ones.
    pub fn load() -> Result<Self> {
        Self::from_file(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific TOML file plus the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = Figment::new().merge(Toml::string(content)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.requests.timeout.is_zero() {
            return Err(SchedulerError::Config(
                "requests.timeout must be at least 1 second".to_owned(),
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(SchedulerError::Config(
                "storage.max_connections must be at least 1".to_owned(),
            ));
        }
        if self.storage.backend == StorageBackend::Postgres && self.storage.url.is_none() {
            return Err(SchedulerError::Config(
                "storage.url is required for the postgres backend".to_owned(),
            ));
        }
        if self.sweeper.enabled {
            if self.sweeper.interval.is_zero() {
                return Err(SchedulerError::Config(
                    "sweeper.interval must be at least 1 second".to_owned(),
                ));
            }
            if self.sweeper.batch_size == 0 {
                return Err(SchedulerError::Config(
                    "sweeper.batch_size must be at least 1".to_owned(),
                ));
            }
        }
        Ok(())
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8081),
        }
    }
}

/// Which store backs the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    /// PostgreSQL via `storage.url`.
    Postgres,
}

/// Cluster store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: StorageBackend,
    /// Connection URL, required for PostgreSQL.
    pub url: Option<String>,
    /// Maximum pool connections.
    pub max_connections: u32,
    /// Timeout for acquiring a connection.
    #[serde(with = "serde_duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: None,
            max_connections: 10,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-request limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline applied to every lifecycle operation.
    #[serde(with = "serde_duration_secs")]
    pub timeout: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Soft-delete sweeper configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Run the sweeper at all.
    pub enabled: bool,
    /// Time between sweeps.
    #[serde(with = "serde_duration_secs")]
    pub interval: Duration,
    /// Maximum rows purged per sweep.
    pub batch_size: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(300),
            batch_size: 100,
        }
    }
}

/// A cluster seeded from configuration at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticCluster {
    /// Cluster name.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Optional mutual-TLS material.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Initial state.
    #[serde(default)]
    pub state: ClusterState,
    /// Initial score.
    #[serde(default = "default_static_score")]
    pub score: u32,
    /// Score ceiling.
    #[serde(default = "default_static_max_score")]
    pub max_score: u32,
    /// This registry governs the cluster.
    #[serde(default)]
    pub govern: bool,
    /// Admission constraints.
    #[serde(default)]
    pub admission_constraints: Vec<AdmissionConstraint>,
    /// Locality hint.
    #[serde(default)]
    pub region: Option<String>,
}

const fn default_static_score() -> u32 {
    corral_proto::score::NEUTRAL
}

const fn default_static_max_score() -> u32 {
    corral_proto::score::DEFAULT_MAX
}

/// Serde helper for Duration as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.api.listen_addr.port(), 8081);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.requests.timeout, Duration::from_secs(10));
        assert!(config.sweeper.enabled);
        assert!(config.static_clusters.is_empty());
    }

    #[test]
    fn parses_toml_with_static_clusters() {
        let config = SchedulerConfig::from_toml(
            r#"
            [storage]
            backend = "postgres"
            url = "postgres://localhost/corral"
            connect_timeout = 2

            [requests]
            timeout = 3

            [sweeper]
            interval = 60
            batch_size = 10

            [[static_clusters]]
            name = "eu-1"
            url = "https://eu-1.example.com"
            state = "cordoned"
            score = 20
            admission_constraints = [
                { type = "has_permission", permission = "beta" },
                { type = "has_user_level", level = "professional" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.storage.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.storage.max_connections, 10);
        assert_eq!(config.requests.timeout, Duration::from_secs(3));
        assert_eq!(config.sweeper.batch_size, 10);

        let eu = &config.static_clusters[0];
        assert_eq!(eu.state, ClusterState::Cordoned);
        assert_eq!(eu.score, 20);
        assert_eq!(eu.max_score, 100);
        assert_eq!(eu.admission_constraints.len(), 2);
    }

    #[test]
    fn unknown_user_level_is_a_config_error() {
        let result = SchedulerConfig::from_toml(
            r#"
            [[static_clusters]]
            name = "eu-1"
            url = "https://eu-1.example.com"
            admission_constraints = [{ type = "has_user_level", level = "gold" }]
            "#,
        );
        assert!(matches!(
            result,
            Err(crate::error::SchedulerError::Config(_))
        ));
    }

    #[test]
    fn zero_sweeper_interval_is_rejected() {
        let err = SchedulerConfig::from_toml("[sweeper]\ninterval = 0\n").unwrap_err();
        assert!(matches!(err, crate::error::SchedulerError::Config(_)));
        assert!(err.to_string().contains("sweeper.interval"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = SchedulerConfig::from_toml("[sweeper]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("sweeper.batch_size"));
    }

    #[test]
    fn disabled_sweeper_skips_its_checks() {
        let config =
            SchedulerConfig::from_toml("[sweeper]\nenabled = false\ninterval = 0\n").unwrap();
        assert!(!config.sweeper.enabled);
    }

    #[test]
    fn postgres_backend_needs_url() {
        let err = SchedulerConfig::from_toml("[storage]\nbackend = \"postgres\"\n").unwrap_err();
        assert!(err.to_string().contains("storage.url"));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let err = SchedulerConfig::from_toml("[requests]\ntimeout = 0\n").unwrap_err();
        assert!(err.to_string().contains("requests.timeout"));
    }
}
