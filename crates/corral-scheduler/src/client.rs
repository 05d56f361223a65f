//! HTTP client for the registry API.
//!
//! Used by cluster agents to register and maintain their cluster, and by
//! orchestrators to request placements.

use std::time::Duration;

use corral_proto::{
    AdmissionReport, ClusterStatus, ErrorBody, ErrorCode, Placement, RegisterRequest,
    UpdateProperty, Workload,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, SchedulerError};

/// HTTP client for interacting with the registry.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    client: Client,
    base_url: String,
}

impl ClusterClient {
    /// Create a new client with a request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Create a new client with the default ten second timeout.
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        Self::new(url, Duration::from_secs(10))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Check if the registry is healthy.
    pub async fn health(&self) -> Result<bool> {
        let response = self.client.get(self.url("/health")).send().await?;
        Ok(response.status().is_success())
    }

    /// Register a cluster.
    pub async fn register(&self, request: &RegisterRequest) -> Result<ClusterStatus> {
        let response = self
            .client
            .post(self.url("/clusters"))
            .json(request)
            .send()
            .await?;
        json_or_error(response).await
    }

    /// Register a cluster, treating `AlreadyExists` as success.
    ///
    /// Agents call this on every start. Returns the current status either
    /// way.
    pub async fn register_idempotent(&self, request: &RegisterRequest) -> Result<ClusterStatus> {
        match self.register(request).await {
            Err(e) if e.code() == ErrorCode::AlreadyExists => {
                debug!(cluster = %request.name, "Cluster already registered");
                self.get(&request.name).await
            }
            other => other,
        }
    }

    /// Update one property of a cluster.
    pub async fn update(&self, name: &str, property: &UpdateProperty) -> Result<()> {
        let response = self
            .client
            .patch(self.url(&format!("/clusters/{name}")))
            .json(property)
            .send()
            .await?;
        empty_or_error(response).await
    }

    /// Deregister a cluster.
    pub async fn deregister(&self, name: &str, force: bool) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/clusters/{name}")))
            .query(&[("force", force)])
            .send()
            .await?;
        empty_or_error(response).await
    }

    /// Start draining a cluster.
    pub async fn drain(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/clusters/{name}/drain")))
            .send()
            .await?;
        empty_or_error(response).await
    }

    /// Get a specific cluster.
    pub async fn get(&self, name: &str) -> Result<ClusterStatus> {
        let response = self
            .client
            .get(self.url(&format!("/clusters/{name}")))
            .send()
            .await?;
        json_or_error(response).await
    }

    /// List all clusters.
    pub async fn list(&self) -> Result<Vec<ClusterStatus>> {
        let response = self.client.get(self.url("/clusters")).send().await?;
        json_or_error(response).await
    }

    /// Request a placement for a workload.
    pub async fn schedule(&self, workload: &Workload) -> Result<Placement> {
        let response = self
            .client
            .post(self.url("/schedule"))
            .json(workload)
            .send()
            .await?;
        json_or_error(response).await
    }

    /// Explain which clusters would admit a workload, without placing it.
    pub async fn admission(&self, workload: &Workload) -> Result<AdmissionReport> {
        let response = self
            .client
            .post(self.url("/admission"))
            .json(workload)
            .send()
            .await?;
        json_or_error(response).await
    }
}

async fn json_or_error<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        Err(error_from_response(response).await)
    }
}

async fn empty_or_error(response: Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

/// Maps an error response back onto [`SchedulerError`].
///
/// Callers branch on [`SchedulerError::code`], which survives the round trip.
async fn error_from_response(response: Response) -> SchedulerError {
    let status = response.status();
    let body = match response.json::<ErrorBody>().await {
        Ok(body) => body,
        Err(_) => ErrorBody::new(
            if status == StatusCode::NOT_FOUND {
                ErrorCode::NotFound
            } else if status.is_client_error() {
                ErrorCode::InvalidArgument
            } else {
                ErrorCode::Internal
            },
            format!("unexpected response: {status}"),
        ),
    };

    match body.code {
        ErrorCode::NoCapacity => SchedulerError::NoCapacity {
            rejections: body.rejections,
        },
        code => SchedulerError::Remote {
            code,
            message: body.message,
        },
    }
}

