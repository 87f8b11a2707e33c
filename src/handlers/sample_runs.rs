use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input};
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::lifecycle::RunAction;
use crate::models::sample_run::{RunPriority, RunStatus, RunType};
use crate::services::sample_runs::{CreateSampleRun, RunFilter};

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSampleRunRequest {
    #[validate(length(min = 1))]
    pub style_ref: String,
    pub run_type: RunType,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub priority: RunPriority,
    pub target_due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: RunAction,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub target_status: RunStatus,
    pub note: Option<String>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviseRequest {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchTransitionRequest {
    #[validate(length(min = 1))]
    pub ids: Vec<Uuid>,
    pub action: RunAction,
}

// Handler functions

pub async fn create_sample_run(
    State(state): State<AppState>,
    Json(payload): Json<CreateSampleRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state
        .services
        .sample_runs
        .create_run(CreateSampleRun {
            style_ref: payload.style_ref,
            run_type: payload.run_type,
            quantity: payload.quantity,
            priority: payload.priority,
            target_due_date: payload.target_due_date,
            start_date: payload.start_date,
            notes: payload.notes,
        })
        .await?;
    info!(run_id = %view.run.id, "sample run created via API");
    Ok(created_response(view))
}

pub async fn get_sample_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.sample_runs.get_run(id)?;
    Ok(success_response(view))
}

pub async fn list_sample_runs(
    State(state): State<AppState>,
    Query(filter): Query<RunFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.sample_runs.list_runs(&filter),
    ))
}

pub async fn transition_sample_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .sample_runs
        .transition(id, payload.action, payload.expected_version)
        .await?;
    Ok(success_response(view))
}

pub async fn rollback_sample_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RollbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .sample_runs
        .rollback(id, payload.target_status, payload.note, payload.expected_version)
        .await?;
    Ok(success_response(view))
}

pub async fn cancel_sample_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.sample_runs.cancel(id).await?;
    Ok(success_response(view))
}

pub async fn revise_sample_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .sample_runs
        .request_revision(id, payload.note)
        .await?;
    Ok(success_response(view))
}

pub async fn batch_transition(
    State(state): State<AppState>,
    Json(payload): Json<BatchTransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let result = state
        .services
        .sample_runs
        .batch_transition(payload.ids, payload.action)
        .await;
    Ok(success_response(result))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sample_run).get(list_sample_runs))
        .route("/batch/transition", post(batch_transition))
        .route("/:id", get(get_sample_run))
        .route("/:id/transition", post(transition_sample_run))
        .route("/:id/rollback", post(rollback_sample_run))
        .route("/:id/cancel", post(cancel_sample_run))
        .route("/:id/revise", post(revise_sample_run))
}
