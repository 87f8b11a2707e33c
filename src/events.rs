//! Domain events.
//!
//! Services publish best-effort notifications over an mpsc channel; the
//! processor task logs them. Event delivery never gates a mutation: a
//! full or closed channel is logged and the write still commits.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{ProductionOrderStatus, PurchaseOrderStatus, RunStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RunCreated(Uuid),
    RunStatusChanged {
        run_id: Uuid,
        old_status: RunStatus,
        new_status: RunStatus,
    },
    RunRolledBack {
        run_id: Uuid,
        from: RunStatus,
        to: RunStatus,
    },
    MrpCalculated {
        order_id: Uuid,
        requirement_count: usize,
    },
    RequirementReviewed(Uuid),
    RequirementUnreviewed(Uuid),
    PurchaseOrderGenerated {
        requirement_id: Uuid,
        purchase_order_id: Uuid,
    },
    PurchaseOrderStatusChanged {
        purchase_order_id: Uuid,
        old_status: PurchaseOrderStatus,
        new_status: PurchaseOrderStatus,
    },
    ProductionOrderStatusChanged {
        order_id: Uuid,
        old_status: ProductionOrderStatus,
        new_status: ProductionOrderStatus,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("failed to send event: {}", e)))
    }
}

/// Creates the event channel used at startup.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Spawned from `main`.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "domain event");
    }
    info!("event channel closed; processor exiting");
}
