//! StitchFlow API Library
//!
//! Garment manufacturing ERP core: the sample-run lifecycle state machine,
//! material requirements planning, and the purchase order workflow, exposed
//! over a REST surface. The `lifecycle` and `mrp` modules are pure and
//! deterministic; persistence and concurrency control live in the service
//! layer.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod mrp;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use serde::Serialize;

// App state shared by all HTTP handlers; the services own the store and
// event channel
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

// Common response wrapper for endpoints that report outcomes rather than
// aggregates
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Full v1 API router; state is applied by the caller.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/sample-runs", handlers::sample_runs::routes())
        .nest("/production-orders", handlers::production_orders::routes())
        .nest("/requirements", handlers::requirements::routes())
        .nest("/purchase-orders", handlers::purchase_orders::routes())
        .nest("/reports", handlers::reports::routes())
}
