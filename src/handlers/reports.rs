use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::common::success_response;
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::services::sample_runs::SchedulerFilter;

/// Per-status lane counts for the kanban board.
pub async fn kanban_counts(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.sample_runs.kanban_counts()))
}

/// Runs with derived metrics for the scheduler view.
pub async fn scheduler_data(
    State(state): State<AppState>,
    Query(filter): Query<SchedulerFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.sample_runs.scheduler_data(&filter),
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/kanban", get(kanban_counts))
        .route("/scheduler", get(scheduler_data))
}
