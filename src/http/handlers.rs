use super::state::AppState;
use crate::jobs::{BotJob, CreateJob, JobError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<BotJob>,
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn job_error_response(e: JobError) -> axum::response::Response {
    let status = match e {
        JobError::Duplicate(_) => StatusCode::CONFLICT,
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    error_response(status, e)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /bots
/// Send a bot into a meeting
pub async fn create_bot(
    State(state): State<AppState>,
    Json(req): Json<CreateJob>,
) -> impl IntoResponse {
    if req.meeting_url.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "meeting_url is required");
    }

    match state.manager.create_job(req).await {
        Ok(job) => {
            info!("Bot job {} accepted", job.id);
            (StatusCode::ACCEPTED, Json(job)).into_response()
        }
        Err(e) => {
            error!("Failed to create bot job: {}", e);
            job_error_response(e)
        }
    }
}

/// GET /bots
pub async fn list_bots(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.manager.list_jobs().await;
    (StatusCode::OK, Json(JobListResponse { jobs }))
}

/// GET /bots/:job_id
pub async fn get_bot(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.manager.get_job(&job_id).await {
        Some(job) => (StatusCode::OK, Json(job)).into_response(),
        None => job_error_response(JobError::NotFound(job_id)),
    }
}

/// POST /bots/:job_id/stop
/// Make the bot leave; the recording so far is kept
pub async fn stop_bot(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    info!("Stop requested for bot job {}", job_id);

    match state.manager.stop_job(&job_id).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => {
            error!("Failed to stop bot job: {}", e);
            job_error_response(e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
