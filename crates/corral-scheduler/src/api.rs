//! HTTP API handlers for the cluster registry.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use corral_proto::{
    AdmissionReport, ClusterState, ClusterStatus, DeregisterRequest, ErrorBody, ErrorCode,
    Placement, RegisterRequest, UpdateProperty, UpdateRequest, Workload,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::SchedulerError;
use crate::service::{ClusterService, ServiceMetrics};

/// Shared application state.
pub struct AppState {
    pub service: Arc<ClusterService>,
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Cluster lifecycle
        .route("/clusters", get(list_clusters).post(register_cluster))
        .route(
            "/clusters/{name}",
            get(get_cluster)
                .patch(update_cluster)
                .delete(deregister_cluster),
        )
        .route("/clusters/{name}/drain", post(drain_cluster))
        // Scheduling
        .route("/schedule", post(schedule))
        .route("/admission", post(admission))
        // Metrics
        .route("/metrics", get(metrics))
        .with_state(state)
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = status_for(code);
        if status.is_server_error() {
            error!(error = %self, code = %code, "Request failed");
        }

        let mut body = ErrorBody::new(code, self.to_string());
        if let Self::NoCapacity { rejections } = self {
            body.rejections = rejections;
        }
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for SchedulerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(rejection.body_text())
    }
}

/// JSON body extractor whose rejection is an [`ErrorBody`] like every other
/// failure.
struct ApiJson<T>(T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SchedulerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::AlreadyExists => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::NoCapacity | ErrorCode::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = Result<T, SchedulerError>;

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

/// Readiness check endpoint. Ready once the store answers.
async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.service.list().await {
        Ok(clusters) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                clusters: clusters.len(),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                clusters: 0,
            }),
        ),
    }
}

/// List all clusters.
async fn list_clusters(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ClusterStatus>>> {
    Ok(Json(state.service.list().await?))
}

/// Register a cluster.
async fn register_cluster(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ClusterStatus>)> {
    let status = state.service.register(request).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// Get a specific cluster.
async fn get_cluster(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ClusterStatus>> {
    Ok(Json(state.service.get(&name).await?))
}

/// Update exactly one property of a cluster.
async fn update_cluster(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    ApiJson(property): ApiJson<UpdateProperty>,
) -> ApiResult<StatusCode> {
    state
        .service
        .update(UpdateRequest::new(name, property))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct DeregisterQuery {
    #[serde(default)]
    force: bool,
}

/// Deregister a cluster.
async fn deregister_cluster(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<DeregisterQuery>,
) -> ApiResult<StatusCode> {
    state
        .service
        .deregister(DeregisterRequest {
            name,
            force: query.force,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drain a cluster.
async fn drain_cluster(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.drain(&name).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Pick a cluster for a workload.
async fn schedule(
    State(state): State<Arc<AppState>>,
    ApiJson(workload): ApiJson<Workload>,
) -> ApiResult<Json<Placement>> {
    Ok(Json(state.service.schedule(&workload).await?))
}

/// Admission diagnostics for a workload.
async fn admission(
    State(state): State<Arc<AppState>>,
    ApiJson(workload): ApiJson<Workload>,
) -> ApiResult<Json<AdmissionReport>> {
    Ok(Json(state.service.admission(&workload).await?))
}

/// Metrics endpoint.
async fn metrics(State(state): State<Arc<AppState>>) -> String {
    let counters = state.service.metrics();
    let mut output = String::new();

    output.push_str("# HELP corral_registry_up Whether the cluster store answered\n");
    output.push_str("# TYPE corral_registry_up gauge\n");
    match state.service.list().await {
        Ok(clusters) => {
            output.push_str("corral_registry_up 1\n\n");
            output.push_str("# HELP corral_clusters Number of registered clusters by state\n");
            output.push_str("# TYPE corral_clusters gauge\n");
            for cluster_state in [
                ClusterState::Available,
                ClusterState::Cordoned,
                ClusterState::Draining,
            ] {
                let count = clusters.iter().filter(|c| c.state == cluster_state).count();
                let _ = writeln!(
                    output,
                    "corral_clusters{{state=\"{cluster_state}\"}} {count}"
                );
            }
        }
        Err(e) => {
            warn!(error = %e, "Cluster gauges skipped, store unavailable");
            output.push_str("corral_registry_up 0\n");
        }
    }

    for (name, help, counter) in [
        (
            "corral_registrations_total",
            "Successful cluster registrations",
            &counters.registrations,
        ),
        (
            "corral_deregistrations_total",
            "Successful cluster deregistrations",
            &counters.deregistrations,
        ),
        (
            "corral_placements_total",
            "Workloads placed on a cluster",
            &counters.placements,
        ),
        (
            "corral_no_capacity_total",
            "Scheduling requests with no eligible cluster",
            &counters.no_capacity,
        ),
        (
            "corral_deadlines_exceeded_total",
            "Operations that exceeded the request deadline",
            &counters.deadlines_exceeded,
        ),
    ] {
        let _ = write!(
            output,
            "\n# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
            ServiceMetrics::get(counter)
        );
    }

    output
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    clusters: usize,
}
