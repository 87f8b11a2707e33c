//! In-memory aggregate store.
//!
//! Every state-mutating operation works against a single exclusive
//! `DashMap` entry, so a check-and-set (validate preconditions, mutate,
//! bump `version`) is atomic per aggregate. Callers may additionally pass
//! an `expected_version` taken from an earlier read; a mismatch means
//! another writer won the race.

use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{MaterialRequirement, ProductionOrder, PurchaseOrder, SampleRun};

#[derive(Default)]
pub struct Store {
    pub sample_runs: DashMap<Uuid, SampleRun>,
    pub production_orders: DashMap<Uuid, ProductionOrder>,
    pub requirements: DashMap<Uuid, MaterialRequirement>,
    pub purchase_orders: DashMap<Uuid, PurchaseOrder>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Optimistic-lock guard: rejects the write when the caller's snapshot is
/// stale.
pub fn check_version(actual: u64, expected: Option<u64>, id: Uuid) -> Result<(), ServiceError> {
    match expected {
        Some(expected) if expected != actual => Err(ServiceError::ConcurrentModification(id)),
        _ => Ok(()),
    }
}
