use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::material_requirement::{
    MaterialCategory, MaterialRequirement, RequirementStatus,
};
use crate::models::production_order::{ProductionOrder, ProductionOrderStatus};
use crate::models::purchase_order::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
use crate::mrp;
use crate::store::{check_version, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductionOrder {
    pub po_number: String,
    pub style_ref: String,
    pub total_quantity: i32,
    pub size_breakdown: HashMap<String, i32>,
    pub unit_price: Decimal,
}

/// One BOM usage line fed into MRP calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLine {
    pub bom_item_id: Uuid,
    pub description: String,
    pub category: MaterialCategory,
    pub uom: String,
    pub consumption_per_piece: Decimal,
    /// Falls back to the request default, then the system default
    pub wastage_pct: Option<Decimal>,
    #[serde(default)]
    pub current_stock: Decimal,
    #[serde(default)]
    pub list_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculateMrp {
    pub usage_lines: Vec<UsageLine>,
    pub default_wastage_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewRequirement {
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub notes: Option<String>,
    pub required_date: Option<NaiveDate>,
    pub expected_delivery: Option<NaiveDate>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratePurchaseOrder {
    /// Append to an existing draft purchase order; a new draft PO is
    /// created when absent.
    pub purchase_order_id: Option<Uuid>,
    pub supplier: Option<String>,
    pub expected_delivery: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPoLine {
    pub requirement: MaterialRequirement,
    pub purchase_order: PurchaseOrder,
    pub line_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: MaterialCategory,
    pub total: usize,
    pub reviewed: usize,
    pub ready_for_po: usize,
    pub already_ordered: usize,
}

/// Aggregate review/ordering progress for a production order's
/// requirements. Recomputed from the live rows on every call; there are no
/// cached counters to drift.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementsSummary {
    pub production_order_id: Uuid,
    pub total: usize,
    pub reviewed: usize,
    pub ready_for_po: usize,
    pub already_ordered: usize,
    pub categories: Vec<CategorySummary>,
}

#[derive(Clone)]
pub struct MrpService {
    store: Arc<Store>,
    event_sender: Option<EventSender>,
}

impl MrpService {
    pub fn new(store: Arc<Store>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(err) = sender.send(event).await {
                warn!("failed to publish event: {}", err);
            }
        }
    }

    #[instrument(skip(self, input), fields(po_number = %input.po_number))]
    pub async fn create_order(
        &self,
        input: CreateProductionOrder,
    ) -> Result<ProductionOrder, ServiceError> {
        ProductionOrder::validate_quantities(input.total_quantity, &input.size_breakdown)?;
        if input.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_price must not be negative".into(),
            ));
        }

        let now = Utc::now();
        let order = ProductionOrder {
            id: Uuid::new_v4(),
            order_number: format!("PRD-{:05}", self.store.production_orders.len() + 1),
            po_number: input.po_number,
            style_ref: input.style_ref,
            total_quantity: input.total_quantity,
            size_breakdown: input.size_breakdown,
            unit_price: input.unit_price,
            total_amount: input.unit_price * Decimal::from(input.total_quantity),
            status: ProductionOrderStatus::Draft,
            mrp_calculated: false,
            mrp_calculated_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.production_orders.insert(order.id, order.clone());
        info!(order_id = %order.id, order_number = %order.order_number, "production order created");
        Ok(order)
    }

    pub fn get_order(&self, id: Uuid) -> Result<ProductionOrder, ServiceError> {
        self.store
            .production_orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Production order {} not found", id)))
    }

    /// The irreversible draft -> confirmed gate required before MRP.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn confirm_order(&self, id: Uuid) -> Result<ProductionOrder, ServiceError> {
        self.update_order_status(id, ProductionOrderStatus::Confirmed)
            .await
    }

    #[instrument(skip(self), fields(order_id = %id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        id: Uuid,
        new_status: ProductionOrderStatus,
    ) -> Result<ProductionOrder, ServiceError> {
        let (old_status, updated) = {
            let mut entry = self.store.production_orders.get_mut(&id).ok_or_else(|| {
                ServiceError::NotFound(format!("Production order {} not found", id))
            })?;
            let old_status = entry.status;
            if !old_status.can_transition_to(new_status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot move production order from '{}' to '{}'",
                    old_status, new_status
                )));
            }
            entry.status = new_status;
            entry.updated_at = Utc::now();
            entry.version += 1;
            (old_status, entry.clone())
        };

        info!(
            "production order {} moved from '{}' to '{}'",
            id, old_status, new_status
        );
        self.emit(Event::ProductionOrderStatusChanged {
            order_id: id,
            old_status,
            new_status,
        })
        .await;
        Ok(updated)
    }

    /// Runs MRP for a confirmed production order.
    ///
    /// Recalculation is a destructive replace: prior requirement rows for
    /// the order, including any review overrides, are dropped. It is
    /// refused once any requirement is already ordered, because the PO
    /// line generated from it must keep exactly one backing requirement.
    #[instrument(skip(self, input), fields(order_id = %order_id, lines = input.usage_lines.len()))]
    pub async fn calculate(
        &self,
        order_id: Uuid,
        input: CalculateMrp,
    ) -> Result<Vec<MaterialRequirement>, ServiceError> {
        if input.usage_lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "usage_lines must not be empty".into(),
            ));
        }
        for line in &input.usage_lines {
            if line.consumption_per_piece <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "consumption_per_piece must be positive for '{}'",
                    line.description
                )));
            }
            if line.wastage_pct.map_or(false, |pct| pct < Decimal::ZERO)
                || line.current_stock < Decimal::ZERO
            {
                return Err(ServiceError::ValidationError(format!(
                    "wastage_pct and current_stock must not be negative for '{}'",
                    line.description
                )));
            }
        }
        let default_wastage = input.default_wastage_pct.unwrap_or(mrp::DEFAULT_WASTAGE_PCT);

        let requirements = {
            let mut order = self
                .store
                .production_orders
                .get_mut(&order_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Production order {} not found", order_id))
                })?;
            if order.status == ProductionOrderStatus::Draft {
                return Err(ServiceError::InvalidStatus(
                    "production order must be confirmed before MRP calculation".into(),
                ));
            }
            if order.status.is_terminal() {
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot run MRP for a production order in status '{}'",
                    order.status
                )));
            }

            let existing: Vec<(Uuid, RequirementStatus)> = self
                .store
                .requirements
                .iter()
                .filter(|entry| entry.value().production_order_id == order_id)
                .map(|entry| (*entry.key(), entry.value().status))
                .collect();
            if let Some((id, _)) = existing
                .iter()
                .find(|(_, status)| *status == RequirementStatus::Ordered)
            {
                return Err(ServiceError::AlreadyOrdered(format!(
                    "requirement {} already has a purchase order line; recalculation is not allowed",
                    id
                )));
            }
            for (id, _) in existing {
                self.store.requirements.remove(&id);
            }

            let now = Utc::now();
            let mut requirements = Vec::with_capacity(input.usage_lines.len());
            for line in input.usage_lines {
                let wastage_pct = line.wastage_pct.unwrap_or(default_wastage);
                let calc = mrp::calc_line(
                    line.consumption_per_piece,
                    order.total_quantity,
                    wastage_pct,
                    line.current_stock,
                );
                let requirement = MaterialRequirement {
                    id: Uuid::new_v4(),
                    production_order_id: order_id,
                    bom_item_id: line.bom_item_id,
                    description: line.description,
                    category: line.category,
                    uom: line.uom,
                    consumption_per_piece: line.consumption_per_piece,
                    wastage_pct,
                    list_price: line.list_price,
                    current_stock: line.current_stock,
                    order_quantity: order.total_quantity,
                    gross_requirement: calc.gross_requirement,
                    wastage_quantity: calc.wastage_quantity,
                    total_requirement: calc.total_requirement,
                    order_quantity_needed: calc.order_quantity_needed,
                    is_reviewed: false,
                    reviewed_quantity: None,
                    reviewed_unit_price: None,
                    review_notes: None,
                    required_date: None,
                    expected_delivery: None,
                    reviewed_at: None,
                    status: RequirementStatus::Calculated,
                    purchase_order_line_id: None,
                    version: 0,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .requirements
                    .insert(requirement.id, requirement.clone());
                requirements.push(requirement);
            }

            order.mrp_calculated = true;
            order.mrp_calculated_at = Some(now);
            order.updated_at = now;
            order.version += 1;
            requirements
        };

        info!(
            "MRP calculated for order {}: {} requirement lines",
            order_id,
            requirements.len()
        );
        self.emit(Event::MrpCalculated {
            order_id,
            requirement_count: requirements.len(),
        })
        .await;
        Ok(requirements)
    }

    pub fn get_requirement(&self, id: Uuid) -> Result<MaterialRequirement, ServiceError> {
        self.store
            .requirements
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Requirement {} not found", id)))
    }

    pub fn requirements_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<MaterialRequirement>, ServiceError> {
        // Surface a 404 for an unknown order rather than an empty list
        self.get_order(order_id)?;
        let mut requirements: Vec<MaterialRequirement> = self
            .store
            .requirements
            .iter()
            .filter(|entry| entry.value().production_order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        requirements.sort_by(|a, b| {
            (a.category, a.description.as_str()).cmp(&(b.category, b.description.as_str()))
        });
        Ok(requirements)
    }

    /// Confirms a requirement line, applying override values or the
    /// computed defaults.
    #[instrument(skip(self, input), fields(requirement_id = %id))]
    pub async fn review(
        &self,
        id: Uuid,
        input: ReviewRequirement,
    ) -> Result<MaterialRequirement, ServiceError> {
        let updated = {
            let mut entry = self
                .store
                .requirements
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Requirement {} not found", id)))?;
            if entry.status == RequirementStatus::Ordered {
                return Err(ServiceError::AlreadyOrdered(format!(
                    "requirement {} already has a purchase order line",
                    id
                )));
            }
            check_version(entry.version, input.expected_version, id)?;
            if input.quantity.map_or(false, |q| q < Decimal::ZERO)
                || input.unit_price.map_or(false, |p| p < Decimal::ZERO)
            {
                return Err(ServiceError::ValidationError(
                    "reviewed quantity and unit price must not be negative".into(),
                ));
            }

            let now = Utc::now();
            entry.is_reviewed = true;
            entry.reviewed_at = Some(now);
            entry.reviewed_quantity = Some(input.quantity.unwrap_or(entry.order_quantity_needed));
            entry.reviewed_unit_price = Some(input.unit_price.unwrap_or(entry.list_price));
            entry.review_notes = input.notes;
            entry.required_date = input.required_date;
            entry.expected_delivery = input.expected_delivery;
            entry.updated_at = now;
            entry.version += 1;
            entry.clone()
        };

        self.emit(Event::RequirementReviewed(id)).await;
        Ok(updated)
    }

    #[instrument(skip(self), fields(requirement_id = %id))]
    pub async fn unreview(&self, id: Uuid) -> Result<MaterialRequirement, ServiceError> {
        let updated = {
            let mut entry = self
                .store
                .requirements
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Requirement {} not found", id)))?;
            if entry.status == RequirementStatus::Ordered {
                return Err(ServiceError::AlreadyOrdered(format!(
                    "requirement {} already has a purchase order line",
                    id
                )));
            }
            entry.clear_review(Utc::now());
            entry.version += 1;
            entry.clone()
        };

        self.emit(Event::RequirementUnreviewed(id)).await;
        Ok(updated)
    }

    /// Generates the (single) purchase order line for a reviewed
    /// requirement.
    ///
    /// The precondition check and the `ordered` flip happen under the
    /// requirement's exclusive store entry, so two concurrent calls cannot
    /// both succeed: the loser observes `ordered` and fails with
    /// `AlreadyOrdered`.
    #[instrument(skip(self, input), fields(requirement_id = %id))]
    pub async fn generate_po(
        &self,
        id: Uuid,
        input: GeneratePurchaseOrder,
    ) -> Result<GeneratedPoLine, ServiceError> {
        let (requirement, purchase_order, line_id, order_id) = {
            let mut entry = self
                .store
                .requirements
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Requirement {} not found", id)))?;
            if entry.status == RequirementStatus::Ordered {
                return Err(ServiceError::AlreadyOrdered(format!(
                    "requirement {} already has a purchase order line",
                    id
                )));
            }
            if !entry.is_reviewed {
                return Err(ServiceError::NotReviewed(format!(
                    "requirement {} must be reviewed before generating a purchase order",
                    id
                )));
            }

            let now = Utc::now();
            let quantity = entry.reviewed_quantity.unwrap_or(entry.order_quantity_needed);
            let unit_price = entry.reviewed_unit_price.unwrap_or(entry.list_price);
            let line_id = Uuid::new_v4();

            let purchase_order = match input.purchase_order_id {
                Some(po_id) => {
                    let mut po = self.store.purchase_orders.get_mut(&po_id).ok_or_else(|| {
                        ServiceError::NotFound(format!("Purchase order {} not found", po_id))
                    })?;
                    if po.status != PurchaseOrderStatus::Draft {
                        return Err(ServiceError::InvalidStatus(format!(
                            "lines can only be added to a draft purchase order (status is '{}')",
                            po.status
                        )));
                    }
                    po.lines.push(PurchaseOrderLine {
                        id: line_id,
                        purchase_order_id: po_id,
                        requirement_id: Some(id),
                        bom_item_id: Some(entry.bom_item_id),
                        description: entry.description.clone(),
                        quantity,
                        unit_price,
                        is_confirmed: false,
                        received_quantity: Decimal::ZERO,
                        created_at: now,
                    });
                    po.updated_at = now;
                    po.version += 1;
                    po.clone()
                }
                None => {
                    let po_id = Uuid::new_v4();
                    let po = PurchaseOrder {
                        id: po_id,
                        po_number: format!(
                            "T2PO-{:05}",
                            self.store.purchase_orders.len() + 1
                        ),
                        supplier: input.supplier.unwrap_or_else(|| "unassigned".to_string()),
                        status: PurchaseOrderStatus::Draft,
                        expected_delivery: input.expected_delivery.or(entry.expected_delivery),
                        lines: vec![PurchaseOrderLine {
                            id: line_id,
                            purchase_order_id: po_id,
                            requirement_id: Some(id),
                            bom_item_id: Some(entry.bom_item_id),
                            description: entry.description.clone(),
                            quantity,
                            unit_price,
                            is_confirmed: false,
                            received_quantity: Decimal::ZERO,
                            created_at: now,
                        }],
                        notes: None,
                        version: 0,
                        created_at: now,
                        updated_at: now,
                    };
                    self.store.purchase_orders.insert(po_id, po.clone());
                    po
                }
            };

            entry.status = RequirementStatus::Ordered;
            entry.purchase_order_line_id = Some(line_id);
            entry.updated_at = now;
            entry.version += 1;
            (
                entry.clone(),
                purchase_order,
                line_id,
                entry.production_order_id,
            )
        };

        // Promote the production order once its last requirement is ordered
        let all_ordered = {
            let mut any = false;
            let mut all = true;
            for entry in self.store.requirements.iter() {
                if entry.value().production_order_id == order_id {
                    any = true;
                    if entry.value().status == RequirementStatus::Calculated {
                        all = false;
                        break;
                    }
                }
            }
            any && all
        };
        if all_ordered {
            let promote = self
                .store
                .production_orders
                .get(&order_id)
                .map(|o| o.status == ProductionOrderStatus::Confirmed)
                .unwrap_or(false);
            if promote {
                if let Err(err) = self
                    .update_order_status(order_id, ProductionOrderStatus::MaterialsOrdered)
                    .await
                {
                    warn!(
                        "could not promote production order {} to materials_ordered: {}",
                        order_id, err
                    );
                }
            }
        }

        info!(
            "purchase order line {} generated for requirement {} on {}",
            line_id, id, purchase_order.po_number
        );
        self.emit(Event::PurchaseOrderGenerated {
            requirement_id: id,
            purchase_order_id: purchase_order.id,
        })
        .await;
        Ok(GeneratedPoLine {
            requirement,
            purchase_order,
            line_id,
        })
    }

    /// Review/ordering progress grouped by material category.
    pub fn requirements_summary(&self, order_id: Uuid) -> Result<RequirementsSummary, ServiceError> {
        let requirements = self.requirements_for_order(order_id)?;

        let mut categories: Vec<CategorySummary> = Vec::new();
        let mut summary = RequirementsSummary {
            production_order_id: order_id,
            total: 0,
            reviewed: 0,
            ready_for_po: 0,
            already_ordered: 0,
            categories: Vec::new(),
        };

        for requirement in &requirements {
            summary.total += 1;
            let idx = match categories
                .iter()
                .position(|c| c.category == requirement.category)
            {
                Some(idx) => idx,
                None => {
                    categories.push(CategorySummary {
                        category: requirement.category,
                        total: 0,
                        reviewed: 0,
                        ready_for_po: 0,
                        already_ordered: 0,
                    });
                    categories.len() - 1
                }
            };
            let entry = &mut categories[idx];
            entry.total += 1;
            if requirement.is_reviewed {
                summary.reviewed += 1;
                entry.reviewed += 1;
            }
            if requirement.is_ready_for_po() {
                summary.ready_for_po += 1;
                entry.ready_for_po += 1;
            }
            if requirement.status == RequirementStatus::Ordered {
                summary.already_ordered += 1;
                entry.already_ordered += 1;
            }
        }

        summary.categories = categories;
        Ok(summary)
    }
}
