use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input};
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::models::production_order::ProductionOrderStatus;
use crate::services::mrp::{CalculateMrp, CreateProductionOrder, UsageLine};

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductionOrderRequest {
    #[validate(length(min = 1))]
    pub po_number: String,
    #[validate(length(min = 1))]
    pub style_ref: String,
    #[validate(range(min = 1))]
    pub total_quantity: i32,
    pub size_breakdown: HashMap<String, i32>,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CalculateMrpRequest {
    #[validate(length(min = 1))]
    pub usage_lines: Vec<UsageLine>,
    pub default_wastage_pct: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: ProductionOrderStatus,
}

// Handler functions

pub async fn create_production_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductionOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state
        .services
        .mrp
        .create_order(CreateProductionOrder {
            po_number: payload.po_number,
            style_ref: payload.style_ref,
            total_quantity: payload.total_quantity,
            size_breakdown: payload.size_breakdown,
            unit_price: payload.unit_price,
        })
        .await?;
    info!(order_id = %order.id, "production order created via API");
    Ok(created_response(order))
}

pub async fn get_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.mrp.get_order(id)?))
}

pub async fn confirm_production_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.mrp.confirm_order(id).await?))
}

pub async fn update_production_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .mrp
        .update_order_status(id, payload.status)
        .await?;
    Ok(success_response(order))
}

pub async fn calculate_mrp(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CalculateMrpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    // Fall back to the configured wastage default when the request has none
    let default_wastage_pct = payload
        .default_wastage_pct
        .unwrap_or_else(|| state.config.default_wastage_decimal());
    let requirements = state
        .services
        .mrp
        .calculate(
            id,
            CalculateMrp {
                usage_lines: payload.usage_lines,
                default_wastage_pct: Some(default_wastage_pct),
            },
        )
        .await?;
    Ok(success_response(requirements))
}

pub async fn list_requirements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.mrp.requirements_for_order(id)?,
    ))
}

pub async fn requirements_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.mrp.requirements_summary(id)?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_production_order))
        .route("/:id", get(get_production_order))
        .route("/:id/confirm", post(confirm_production_order))
        .route("/:id/status", post(update_production_order_status))
        .route("/:id/mrp/calculate", post(calculate_mrp))
        .route("/:id/requirements", get(list_requirements))
        .route("/:id/requirements/summary", get(requirements_summary))
}
