use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequirementStatus {
    Calculated,
    Ordered,
    Received,
}

/// Ordered by declaration: listings group fabric first, sundries last.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MaterialCategory {
    Fabric,
    Trim,
    Packing,
    Label,
    Other,
}

/// One material requirement line per BOM usage line per production order,
/// produced by MRP calculation.
///
/// BOM data is snapshotted at calculation time so a later BOM edit does not
/// silently change an already-computed requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub id: Uuid,
    pub production_order_id: Uuid,

    // BOM line snapshot
    pub bom_item_id: Uuid,
    pub description: String,
    pub category: MaterialCategory,
    pub uom: String,
    pub consumption_per_piece: Decimal,
    pub wastage_pct: Decimal,
    pub list_price: Decimal,
    pub current_stock: Decimal,

    // Computed at calculation time
    pub order_quantity: i32,
    pub gross_requirement: Decimal,
    pub wastage_quantity: Decimal,
    pub total_requirement: Decimal,
    pub order_quantity_needed: Decimal,

    // Human review overrides; all None until reviewed
    pub is_reviewed: bool,
    pub reviewed_quantity: Option<Decimal>,
    pub reviewed_unit_price: Option<Decimal>,
    pub review_notes: Option<String>,
    pub required_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    pub reviewed_at: Option<DateTime<Utc>>,

    pub status: RequirementStatus,
    /// Set exactly once, when a purchase order line is generated
    pub purchase_order_line_id: Option<Uuid>,

    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialRequirement {
    /// Reviewed and not yet turned into a purchase order line.
    pub fn is_ready_for_po(&self) -> bool {
        self.is_reviewed && self.status != RequirementStatus::Ordered
    }

    /// Clears all review overrides (used by unreview).
    pub fn clear_review(&mut self, now: DateTime<Utc>) {
        self.is_reviewed = false;
        self.reviewed_quantity = None;
        self.reviewed_unit_price = None;
        self.review_notes = None;
        self.required_date = None;
        self.expected_delivery = None;
        self.reviewed_at = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_sort_in_declaration_order() {
        let mut categories = vec![
            MaterialCategory::Other,
            MaterialCategory::Trim,
            MaterialCategory::Fabric,
            MaterialCategory::Label,
        ];
        categories.sort();
        assert_eq!(
            categories,
            vec![
                MaterialCategory::Fabric,
                MaterialCategory::Trim,
                MaterialCategory::Label,
                MaterialCategory::Other,
            ]
        );
    }
}
