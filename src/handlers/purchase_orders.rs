use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input};
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::models::purchase_order::PurchaseOrderStatus;
use crate::services::purchase_orders::{
    AddPurchaseOrderLine, CreatePurchaseOrder, ReceiveDelivery,
};

#[derive(Debug, Deserialize)]
pub struct ListPurchaseOrdersQuery {
    pub status: Option<PurchaseOrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePoStatusRequest {
    pub status: PurchaseOrderStatus,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveDeliveryRequest {
    #[validate(length(min = 1))]
    pub lines: Vec<crate::services::purchase_orders::LineReceipt>,
}

pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.purchase_orders.create_po(payload).await?;
    Ok(created_response(view))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(state.services.purchase_orders.get_po(id)?))
}

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(query): Query<ListPurchaseOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.purchase_orders.list_pos(query.status),
    ))
}

pub async fn add_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddPurchaseOrderLine>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.purchase_orders.add_line(id, payload).await?;
    Ok(success_response(view))
}

pub async fn confirm_line(
    State(state): State<AppState>,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .purchase_orders
        .confirm_line(id, line_id)
        .await?;
    Ok(success_response(view))
}

pub async fn send_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.purchase_orders.send(id).await?,
    ))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePoStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .services
        .purchase_orders
        .update_status(id, payload.status, payload.expected_version)
        .await?;
    Ok(success_response(view))
}

pub async fn receive_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiveDeliveryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state
        .services
        .purchase_orders
        .receive(
            id,
            ReceiveDelivery {
                lines: payload.lines,
            },
        )
        .await?;
    Ok(success_response(view))
}

pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(success_response(
        state.services.purchase_orders.cancel(id).await?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:line_id/confirm", post(confirm_line))
        .route("/:id/send", post(send_purchase_order))
        .route("/:id/status", post(update_status))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}
