//! Drone registry — registration and availability lookups

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::store::DispatchStore;
use crate::types::{Drone, DroneId, DroneSpec, DroneState};

/// Registration and lookup service for the drone fleet
#[derive(Clone)]
pub struct DroneRegistry {
    store: Arc<DispatchStore>,
}

impl DroneRegistry {
    /// Create a registry over the shared store
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Register a new drone
    ///
    /// Fails `DuplicateSerial` if the serial is taken, or `InvalidField`
    /// for a serial, weight limit, or battery level outside its domain.
    /// New drones start `Idle` with no cargo.
    pub fn register(&self, spec: DroneSpec) -> Result<Drone> {
        spec.validate()?;
        let drone = self.store.insert_drone(
            spec.serial,
            spec.model,
            spec.weight_limit,
            spec.battery,
        )?;

        info!(
            drone_id = drone.id,
            serial = %drone.serial,
            model = %drone.model,
            weight_limit = drone.weight_limit,
            "Drone registered"
        );
        Ok(drone)
    }

    /// Fetch a drone by id
    pub fn drone(&self, drone_id: DroneId) -> Result<Drone> {
        self.store.drone(drone_id)
    }

    /// Drones in `Idle` state with at least `min_battery` percent charge
    pub fn list_available(&self, min_battery: f64) -> Result<Vec<Drone>> {
        Ok(self
            .store
            .drones()?
            .into_iter()
            .filter(|d| d.state == DroneState::Idle && d.battery >= min_battery)
            .collect())
    }
}
