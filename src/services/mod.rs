// Core services
pub mod mrp;
pub mod purchase_orders;
pub mod sample_runs;
