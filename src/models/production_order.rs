use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductionOrderStatus {
    Draft,
    Confirmed,
    MaterialsOrdered,
    InProduction,
    Completed,
    Cancelled,
}

impl ProductionOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Forward-only lifecycle; `cancelled` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use ProductionOrderStatus::*;
        match (*self, next) {
            (Draft, Confirmed) => true,
            (Confirmed, MaterialsOrdered) => true,
            (MaterialsOrdered, InProduction) => true,
            (InProduction, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// A bulk production order for a style, sized by customer breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: Uuid,
    pub order_number: String,
    /// Customer purchase order reference
    pub po_number: String,
    pub style_ref: String,
    pub total_quantity: i32,
    /// Size label -> quantity; values must sum to `total_quantity`
    pub size_breakdown: HashMap<String, i32>,
    pub unit_price: Decimal,
    /// Always `total_quantity * unit_price`; never client-supplied
    pub total_amount: Decimal,
    pub status: ProductionOrderStatus,
    /// True once MRP calculation has succeeded at least once
    pub mrp_calculated: bool,
    pub mrp_calculated_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionOrder {
    /// Checks quantity and size-breakdown consistency.
    pub fn validate_quantities(
        total_quantity: i32,
        size_breakdown: &HashMap<String, i32>,
    ) -> Result<(), ServiceError> {
        if total_quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "total_quantity must be positive".into(),
            ));
        }
        if size_breakdown.is_empty() {
            return Err(ServiceError::ValidationError(
                "size_breakdown must not be empty".into(),
            ));
        }
        if let Some((size, qty)) = size_breakdown.iter().find(|(_, qty)| **qty <= 0) {
            return Err(ServiceError::ValidationError(format!(
                "size '{}' has non-positive quantity {}",
                size, qty
            )));
        }
        let sum: i64 = size_breakdown.values().map(|q| *q as i64).sum();
        if sum != total_quantity as i64 {
            return Err(ServiceError::ValidationError(format!(
                "size_breakdown sums to {} but total_quantity is {}",
                sum, total_quantity
            )));
        }
        Ok(())
    }
}
