use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::material_requirement::RequirementStatus;
use crate::models::purchase_order::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
use crate::store::{check_version, Store};

/// A purchase order with its derived fields, recomputed at read time.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderView {
    #[serde(flatten)]
    pub purchase_order: PurchaseOrder,
    pub all_lines_confirmed: bool,
    pub total_amount: Decimal,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

impl PurchaseOrderView {
    fn derive(purchase_order: PurchaseOrder) -> Self {
        let today = Utc::now().date_naive();
        Self {
            all_lines_confirmed: purchase_order.all_lines_confirmed(),
            total_amount: purchase_order.total_amount(),
            is_overdue: purchase_order.is_overdue(today),
            days_overdue: purchase_order.days_overdue(today),
            purchase_order,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseOrder {
    pub supplier: String,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddPurchaseOrderLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub bom_item_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReceipt {
    pub line_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveDelivery {
    pub lines: Vec<LineReceipt>,
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Arc<Store>,
    event_sender: Option<EventSender>,
}

impl PurchaseOrderService {
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

    #[instrument(skip(self, input), fields(supplier = %input.supplier))]
    pub async fn create_po(
        &self,
        input: CreatePurchaseOrder,
    ) -> Result<PurchaseOrderView, ServiceError> {
        if input.supplier.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "supplier must not be empty".into(),
            ));
        }
        let now = Utc::now();
        let po = PurchaseOrder {
            id: Uuid::new_v4(),
            po_number: format!("T2PO-{:05}", self.store.purchase_orders.len() + 1),
            supplier: input.supplier,
            status: PurchaseOrderStatus::Draft,
            expected_delivery: input.expected_delivery,
            lines: Vec::new(),
            notes: input.notes,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.purchase_orders.insert(po.id, po.clone());
        info!(po_id = %po.id, po_number = %po.po_number, "purchase order created");
        Ok(PurchaseOrderView::derive(po))
    }

    pub fn get_po(&self, id: Uuid) -> Result<PurchaseOrderView, ServiceError> {
        self.store
            .purchase_orders
            .get(&id)
            .map(|entry| PurchaseOrderView::derive(entry.value().clone()))
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", id)))
    }

    pub fn list_pos(&self, status: Option<PurchaseOrderStatus>) -> Vec<PurchaseOrderView> {
        let mut pos: Vec<PurchaseOrderView> = self
            .store
            .purchase_orders
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.value().status == s))
            .map(|entry| PurchaseOrderView::derive(entry.value().clone()))
            .collect();
        pos.sort_by(|a, b| {
            a.purchase_order
                .po_number
                .cmp(&b.purchase_order.po_number)
        });
        pos
    }

    /// Manually adds a line to a draft purchase order. Because
    /// `all_lines_confirmed` is derived, adding a line after the others
    /// were confirmed automatically re-closes the send gate.
    #[instrument(skip(self, input), fields(po_id = %id))]
    pub async fn add_line(
        &self,
        id: Uuid,
        input: AddPurchaseOrderLine,
    ) -> Result<PurchaseOrderView, ServiceError> {
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "line quantity must be positive".into(),
            ));
        }
        if input.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_price must not be negative".into(),
            ));
        }
        let updated = {
            let mut entry = self.store.purchase_orders.get_mut(&id).ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", id))
            })?;
            if entry.status != PurchaseOrderStatus::Draft {
                return Err(ServiceError::InvalidStatus(format!(
                    "lines can only be added to a draft purchase order (status is '{}')",
                    entry.status
                )));
            }
            let now = Utc::now();
            entry.lines.push(PurchaseOrderLine {
                id: Uuid::new_v4(),
                purchase_order_id: id,
                requirement_id: None,
                bom_item_id: input.bom_item_id,
                description: input.description,
                quantity: input.quantity,
                unit_price: input.unit_price,
                is_confirmed: false,
                received_quantity: Decimal::ZERO,
                created_at: now,
            });
            entry.updated_at = now;
            entry.version += 1;
            entry.clone()
        };
        Ok(PurchaseOrderView::derive(updated))
    }

    #[instrument(skip(self), fields(po_id = %id, line_id = %line_id))]
    pub async fn confirm_line(
        &self,
        id: Uuid,
        line_id: Uuid,
    ) -> Result<PurchaseOrderView, ServiceError> {
        let updated = {
            let mut entry = self.store.purchase_orders.get_mut(&id).ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", id))
            })?;
            if entry.status.is_terminal() {
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot confirm a line on a purchase order in status '{}'",
                    entry.status
                )));
            }
            let now = Utc::now();
            let line = entry
                .lines
                .iter_mut()
                .find(|line| line.id == line_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Purchase order line {} not found", line_id))
                })?;
            line.is_confirmed = true;
            entry.updated_at = now;
            entry.version += 1;
            entry.clone()
        };
        info!("line {} confirmed on purchase order {}", line_id, id);
        Ok(PurchaseOrderView::derive(updated))
    }

    /// Sends the order to the supplier. Gated on the recomputed
    /// line-confirmation AND; an order with zero lines never passes.
    #[instrument(skip(self), fields(po_id = %id))]
    pub async fn send(&self, id: Uuid) -> Result<PurchaseOrderView, ServiceError> {
        self.transition(id, PurchaseOrderStatus::Sent, None).await
    }

    #[instrument(skip(self), fields(po_id = %id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: PurchaseOrderStatus,
        expected_version: Option<u64>,
    ) -> Result<PurchaseOrderView, ServiceError> {
        self.transition(id, new_status, expected_version).await
    }

    async fn transition(
        &self,
        id: Uuid,
        new_status: PurchaseOrderStatus,
        expected_version: Option<u64>,
    ) -> Result<PurchaseOrderView, ServiceError> {
        let (old_status, updated) = {
            let mut entry = self.store.purchase_orders.get_mut(&id).ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", id))
            })?;
            check_version(entry.version, expected_version, id)?;
            let old_status = entry.status;
            if !old_status.can_transition_to(new_status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot move purchase order from '{}' to '{}'",
                    old_status, new_status
                )));
            }
            // The send gate is recomputed here, not read from a stored flag
            if new_status == PurchaseOrderStatus::Sent && !entry.all_lines_confirmed() {
                return Err(ServiceError::ValidationError(
                    "cannot send purchase order: not all lines are confirmed".into(),
                ));
            }
            entry.status = new_status;
            entry.updated_at = Utc::now();
            entry.version += 1;
            (old_status, entry.clone())
        };

        info!(
            "purchase order {} moved from '{}' to '{}'",
            id, old_status, new_status
        );
        self.emit(Event::PurchaseOrderStatusChanged {
            purchase_order_id: id,
            old_status,
            new_status,
        })
        .await;
        Ok(PurchaseOrderView::derive(updated))
    }

    /// Books received quantities per line. A complete delivery moves the
    /// order to `received`; anything less moves it to `partial_received`.
    #[instrument(skip(self, input), fields(po_id = %id))]
    pub async fn receive(
        &self,
        id: Uuid,
        input: ReceiveDelivery,
    ) -> Result<PurchaseOrderView, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one line receipt is required".into(),
            ));
        }
        let (old_status, updated) = {
            let mut entry = self.store.purchase_orders.get_mut(&id).ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", id))
            })?;
            let old_status = entry.status;
            let receivable = matches!(
                old_status,
                PurchaseOrderStatus::Confirmed
                    | PurchaseOrderStatus::InProduction
                    | PurchaseOrderStatus::Shipped
                    | PurchaseOrderStatus::PartialReceived
            );
            if !receivable {
                return Err(ServiceError::InvalidStatus(format!(
                    "cannot receive against a purchase order in status '{}'",
                    old_status
                )));
            }
            for receipt in &input.lines {
                if receipt.quantity <= Decimal::ZERO {
                    return Err(ServiceError::ValidationError(
                        "received quantity must be positive".into(),
                    ));
                }
                if !entry.lines.iter().any(|line| line.id == receipt.line_id) {
                    return Err(ServiceError::NotFound(format!(
                        "Purchase order line {} not found",
                        receipt.line_id
                    )));
                }
            }

            let now = Utc::now();
            for receipt in &input.lines {
                for line in entry.lines.iter_mut() {
                    if line.id == receipt.line_id {
                        line.received_quantity += receipt.quantity;
                    }
                }
            }
            let fully_received = entry.lines.iter().all(|line| line.is_fully_received());
            entry.status = if fully_received {
                PurchaseOrderStatus::Received
            } else {
                PurchaseOrderStatus::PartialReceived
            };
            entry.updated_at = now;
            entry.version += 1;
            (old_status, entry.clone())
        };

        // Requirements backing fully received lines move to `received`
        for line in &updated.lines {
            if let Some(requirement_id) = line.requirement_id {
                if line.is_fully_received() {
                    if let Some(mut requirement) =
                        self.store.requirements.get_mut(&requirement_id)
                    {
                        if requirement.status == RequirementStatus::Ordered {
                            requirement.status = RequirementStatus::Received;
                            requirement.updated_at = Utc::now();
                            requirement.version += 1;
                        }
                    }
                }
            }
        }

        info!(
            "purchase order {} receipt booked: '{}' -> '{}'",
            id, old_status, updated.status
        );
        self.emit(Event::PurchaseOrderStatusChanged {
            purchase_order_id: id,
            old_status,
            new_status: updated.status,
        })
        .await;
        Ok(PurchaseOrderView::derive(updated))
    }

    #[instrument(skip(self), fields(po_id = %id))]
    pub async fn cancel(&self, id: Uuid) -> Result<PurchaseOrderView, ServiceError> {
        self.transition(id, PurchaseOrderStatus::Cancelled, None)
            .await
    }
}
