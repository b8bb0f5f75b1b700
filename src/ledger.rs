//! Capacity ledger — committed-weight reads
//!
//! Pure read computations over the committed tables. The loading engine
//! performs the same computation inside its transaction scope (see
//! `loading.rs`), so admission decisions never read a half-applied batch;
//! this service is for callers outside a transaction.

use std::sync::Arc;

use crate::error::Result;
use crate::store::DispatchStore;
use crate::types::DroneId;

/// Read-only view of committed payload weight
#[derive(Clone)]
pub struct CapacityLedger {
    store: Arc<DispatchStore>,
}

impl CapacityLedger {
    /// Create a ledger over the shared store
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Sum of medication weights currently attached to a drone
    ///
    /// `0.0` for a drone without cargo; fails `DroneNotFound` for an
    /// absent drone.
    pub fn committed_weight(&self, drone_id: DroneId) -> Result<f64> {
        self.store.committed_weight(drone_id)
    }

    /// Whether adding `added_weight` would push the drone past its limit
    pub fn would_exceed(&self, drone_id: DroneId, added_weight: f64) -> Result<bool> {
        let drone = self.store.drone(drone_id)?;
        let committed = self.store.committed_weight(drone_id)?;
        Ok(committed + added_weight > f64::from(drone.weight_limit))
    }
}
