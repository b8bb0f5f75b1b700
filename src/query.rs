//! Query façade — read-only fleet projections
//!
//! No invariants of its own: every method reflects the latest committed
//! state. The availability threshold is the same fixed battery gate the
//! loading engine enforces.

use std::sync::Arc;

use crate::config::defaults::MIN_LOADING_BATTERY;
use crate::error::Result;
use crate::store::DispatchStore;
use crate::types::{Drone, DroneId, DroneState, Medication};

/// Read-only projections over the fleet
#[derive(Clone)]
pub struct FleetQuery {
    store: Arc<DispatchStore>,
}

impl FleetQuery {
    /// Create a query façade over the shared store
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Drones currently able to accept a first load: `Idle` with battery at
    /// or above the loading threshold
    pub fn available_for_loading(&self) -> Result<Vec<Drone>> {
        Ok(self
            .store
            .drones()?
            .into_iter()
            .filter(|d| d.state == DroneState::Idle && d.battery >= MIN_LOADING_BATTERY)
            .collect())
    }

    /// Medications loaded on a drone
    ///
    /// An existing drone with no cargo yields an empty vec; an absent drone
    /// fails `DroneNotFound`.
    pub fn manifest(&self, drone_id: DroneId) -> Result<Vec<Medication>> {
        self.store.medications_for(drone_id)
    }

    /// Current battery level for a drone
    pub fn battery_level(&self, drone_id: DroneId) -> Result<f64> {
        Ok(self.store.drone(drone_id)?.battery)
    }

    /// Snapshot of the whole fleet, ordered by id
    pub fn fleet(&self) -> Result<Vec<Drone>> {
        self.store.drones()
    }
}
