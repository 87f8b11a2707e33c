pub mod material_requirement;
pub mod production_order;
pub mod purchase_order;
pub mod sample_run;

pub use material_requirement::{MaterialCategory, MaterialRequirement, RequirementStatus};
pub use production_order::{ProductionOrder, ProductionOrderStatus};
pub use purchase_order::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
pub use sample_run::{RunPriority, RunStatus, RunType, SampleRun};
