pub mod common;
pub mod health;
pub mod production_orders;
pub mod purchase_orders;
pub mod reports;
pub mod requirements;
pub mod sample_runs;

use std::sync::Arc;

use crate::events::EventSender;
use crate::store::Store;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub sample_runs: Arc<crate::services::sample_runs::SampleRunService>,
    pub mrp: Arc<crate::services::mrp::MrpService>,
    pub purchase_orders: Arc<crate::services::purchase_orders::PurchaseOrderService>,
}

impl AppServices {
    pub fn new(store: Arc<Store>, event_sender: Option<EventSender>) -> Self {
        Self {
            sample_runs: Arc::new(crate::services::sample_runs::SampleRunService::new(
                store.clone(),
                event_sender.clone(),
            )),
            mrp: Arc::new(crate::services::mrp::MrpService::new(
                store.clone(),
                event_sender.clone(),
            )),
            purchase_orders: Arc::new(
                crate::services::purchase_orders::PurchaseOrderService::new(store, event_sender),
            ),
        }
    }
}
