use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Purchase order workflow status: a strictly-ordered forward chain with
/// `cancelled` reachable from any non-terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    InProduction,
    Shipped,
    PartialReceived,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Received | Self::Cancelled)
    }

    /// Forward-only edges; no skipping.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use PurchaseOrderStatus::*;
        match (*self, next) {
            (Draft, Sent) => true,
            (Sent, Confirmed) => true,
            (Confirmed, InProduction | Shipped | Received) => true,
            (InProduction, Shipped | Received) => true,
            (Shipped, Received) => true,
            (PartialReceived, Received) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    /// Back-link to the material requirement this line was generated from;
    /// None for manually added lines.
    pub requirement_id: Option<Uuid>,
    pub bom_item_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub is_confirmed: bool,
    pub received_quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrderLine {
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub supplier: String,
    pub status: PurchaseOrderStatus,
    pub expected_delivery: Option<NaiveDate>,
    pub lines: Vec<PurchaseOrderLine>,
    pub notes: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// AND over all lines, recomputed on every call (never cached) so a
    /// line added after confirmation resets the gate automatically.
    /// An order with no lines is not confirmed.
    pub fn all_lines_confirmed(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|line| line.is_confirmed)
    }

    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|line| line.line_total()).sum()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.expected_delivery {
            Some(expected) => expected < today && !self.status.is_terminal(),
            None => false,
        }
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        match self.expected_delivery {
            Some(expected) if self.is_overdue(today) => (today - expected).num_days(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, unit_price: Decimal, confirmed: bool) -> PurchaseOrderLine {
        PurchaseOrderLine {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::nil(),
            requirement_id: None,
            bom_item_id: None,
            description: "test".into(),
            quantity,
            unit_price,
            is_confirmed: confirmed,
            received_quantity: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    fn po(lines: Vec<PurchaseOrderLine>) -> PurchaseOrder {
        PurchaseOrder {
            id: Uuid::new_v4(),
            po_number: "T2PO-00001".into(),
            supplier: "Mill A".into(),
            status: PurchaseOrderStatus::Draft,
            expected_delivery: None,
            lines,
            notes: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn all_lines_confirmed_is_recomputed_and_empty_is_false() {
        let mut order = po(vec![line(dec!(10), dec!(2), true)]);
        assert!(order.all_lines_confirmed());

        // A newly added line resets the gate because the AND is derived
        order.lines.push(line(dec!(5), dec!(1), false));
        assert!(!order.all_lines_confirmed());

        assert!(!po(vec![]).all_lines_confirmed());
    }

    #[test]
    fn total_amount_sums_line_totals() {
        let order = po(vec![
            line(dec!(10), dec!(2.50), true),
            line(dec!(4), dec!(1.25), false),
        ]);
        assert_eq!(order.total_amount(), dec!(30.00));
    }

    #[test]
    fn overdue_only_while_open() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let mut order = po(vec![]);
        order.expected_delivery = NaiveDate::from_ymd_opt(2026, 3, 1);
        assert!(order.is_overdue(today));
        assert_eq!(order.days_overdue(today), 9);

        order.status = PurchaseOrderStatus::Received;
        assert!(!order.is_overdue(today));
        assert_eq!(order.days_overdue(today), 0);
    }
}
