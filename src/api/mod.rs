use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::auth::{AccessPolicy, Action};
use crate::error::JobError;
use crate::registry::{JobId, JobStatus};
use crate::service::{JobOutput, JobService};

#[derive(Clone)]
pub struct ApiState {
    pub jobs: JobService,
    pub policy: Arc<AccessPolicy>,
}

#[derive(Debug, Deserialize)]
struct StartJobRequest {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct JobIdResponse {
    job_id: JobId,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Request failures, rendered as a status code plus `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Job(JobError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Job(JobError::StartFailure { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Build the job API.
///
/// Every route is guarded by the bearer-token check for its action. Paths
/// ending in an empty id are answered with 400 rather than falling through
/// to 404.
pub fn router(state: ApiState) -> Router {
    let policy = state.policy.clone();

    Router::new()
        .merge(guarded(
            Action::Start,
            &policy,
            Router::new().route("/jobs/start", post(start_job)),
        ))
        .merge(guarded(
            Action::Stop,
            &policy,
            Router::new()
                .route("/jobs/stop/:id", put(stop_job))
                .route("/jobs/stop/", put(missing_job_id)),
        ))
        .merge(guarded(
            Action::Status,
            &policy,
            Router::new()
                .route("/jobs/status/:id", get(job_status))
                .route("/jobs/status/", get(missing_job_id)),
        ))
        .merge(guarded(
            Action::Output,
            &policy,
            Router::new()
                .route("/jobs/output/:id", get(job_output))
                .route("/jobs/output/", get(missing_job_id)),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn guarded(
    action: Action,
    policy: &Arc<AccessPolicy>,
    routes: Router<ApiState>,
) -> Router<ApiState> {
    routes.route_layer(middleware::from_fn_with_state(
        (policy.clone(), action),
        authorize,
    ))
}

async fn authorize(
    State((policy, action)): State<(Arc<AccessPolicy>, Action)>,
    request: Request,
    next: Next,
) -> Response {
    let role = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| policy.role_for_credential(token));

    let Some(role) = role else {
        tracing::debug!(%action, "Rejected request without valid credentials");
        return ApiError::Unauthorized.into_response();
    };

    if !policy.is_authorized(role, action) {
        tracing::warn!(%role, %action, "Role not permitted to perform action");
        return ApiError::Forbidden.into_response();
    }

    next.run(request).await
}

async fn start_job(
    State(state): State<ApiState>,
    payload: Result<Json<StartJobRequest>, JsonRejection>,
) -> Result<Json<JobIdResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    if request.command.trim().is_empty() {
        return Err(ApiError::BadRequest("Command is required".to_string()));
    }

    let job_id = state.jobs.start_job(&request.command, &request.args).await?;
    Ok(Json(JobIdResponse { job_id }))
}

async fn stop_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobIdResponse>, ApiError> {
    state.jobs.stop_job(&id).await?;
    Ok(Json(JobIdResponse { job_id: id }))
}

async fn job_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = state.jobs.job(&id).await?;
    Ok(Json(StatusResponse {
        status: job.status,
        exit_code: job.exit_code,
    }))
}

async fn job_output(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobOutput>, ApiError> {
    Ok(Json(state.jobs.output(&id).await?))
}

async fn missing_job_id() -> ApiError {
    ApiError::BadRequest("Invalid URL - empty job ID".to_string())
}
