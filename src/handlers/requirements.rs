use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, success_response};
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::services::mrp::{GeneratePurchaseOrder, ReviewRequirement};

pub async fn review_requirement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequirement>,
) -> Result<impl IntoResponse, ApiError> {
    let requirement = state.services.mrp.review(id, payload).await?;
    Ok(success_response(requirement))
}

pub async fn unreview_requirement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let requirement = state.services.mrp.unreview(id).await?;
    Ok(success_response(requirement))
}

pub async fn generate_po(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GeneratePurchaseOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let generated = state.services.mrp.generate_po(id, payload).await?;
    info!(
        requirement_id = %id,
        po_id = %generated.purchase_order.id,
        "purchase order line generated via API"
    );
    Ok(created_response(generated))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:id/review", post(review_requirement))
        .route("/:id/unreview", post(unreview_requirement))
        .route("/:id/generate-po", post(generate_po))
}
