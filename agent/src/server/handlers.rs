//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AgentError;
use crate::models::deployment::{DeployRequest, DestroyRequest};
use crate::models::job::{JobKind, JobRecord};
use crate::server::state::ServerState;
use crate::telemetry::{collect_resources, SystemResources};
use crate::utils::{version_info, VersionInfo};

const DEFAULT_JOB_LIMIT: usize = 50;

/// Error returned by handlers, rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        Self(e)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AgentError::JobError(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "preview-agent".to_string(),
        version: version_info().version,
    })
}

/// Version handler
pub async fn version_handler() -> Json<VersionInfo> {
    Json(version_info())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeploymentsResponse {
    pub deployments: Vec<String>,
    pub total: usize,
}

/// List branch handles with a deployment directory
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
) -> Json<DeploymentsResponse> {
    let deployments: Vec<String> = state.orchestrator.list().await.into_iter().collect();
    let total = deployments.len();
    Json(DeploymentsResponse { deployments, total })
}

/// Queue a deploy job
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeployRequest>,
) -> Result<(StatusCode, Json<JobRecord>), ApiError> {
    request.validate()?;
    let job = state.queue.perform_later(JobKind::Deploy(request))?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DestroyQuery {
    pub root_directory: Option<String>,
}

/// Queue a destroy job for an existing deployment
pub async fn destroy_handler(
    State(state): State<Arc<ServerState>>,
    Path(branch): Path<String>,
    Query(query): Query<DestroyQuery>,
) -> Result<(StatusCode, Json<JobRecord>), ApiError> {
    let request = DestroyRequest {
        branch,
        root_directory: query.root_directory,
    };
    request.validate()?;
    if !state.orchestrator.registry().exists(&request.branch).await {
        return Err(AgentError::NotFound(format!(
            "No deployment found for branch \"{}\"",
            request.branch
        ))
        .into());
    }
    let job = state.queue.perform_later(JobKind::Destroy(request))?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub limit: Option<usize>,
}

/// Recent jobs, most recent first
pub async fn list_jobs_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<JobsQuery>,
) -> Json<Vec<JobRecord>> {
    Json(state.jobs().list(query.limit.unwrap_or(DEFAULT_JOB_LIMIT)))
}

pub async fn get_job_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .jobs()
        .get(&id)
        .map(Json)
        .ok_or_else(|| AgentError::NotFound(format!("Job {id}")).into())
}

/// Re-queue a failed job
pub async fn retry_job_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JobRecord>), ApiError> {
    let job = state.queue.retry(&id)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Disk and memory left for new deployments
pub async fn system_handler(State(state): State<Arc<ServerState>>) -> Json<SystemResources> {
    let dir = state.deployments_dir.clone();
    let resources = tokio::task::spawn_blocking(move || collect_resources(&dir)).await;
    match resources {
        Ok(resources) => Json(resources),
        Err(e) => {
            warn!("Resource collection task failed: {}", e);
            Json(collect_resources(&state.deployments_dir))
        }
    }
}
