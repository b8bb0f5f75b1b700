//! Load admission and state-transition engine
//!
//! Validates a medication batch against a drone and applies it atomically.
//! Preconditions are checked in a fixed order, each mapping to its own
//! error kind; the first failure aborts with zero side effects. The whole
//! check-and-commit sequence runs inside the drone's load transaction, so
//! two concurrent batches can never both pass the capacity check against a
//! stale committed-weight snapshot.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::defaults::MIN_LOADING_BATTERY;
use crate::error::{DispatchError, Result};
use crate::store::DispatchStore;
use crate::types::{DroneId, DroneState, LoadReceipt, Medication, MedicationSpec};

/// Cargo loading engine
#[derive(Clone)]
pub struct CargoLoader {
    store: Arc<DispatchStore>,
}

impl CargoLoader {
    /// Create a loader over the shared store
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Load a batch of medications onto a drone
    ///
    /// The batch is all-or-nothing: on success every item is persisted and
    /// the drone transitions to `Loaded` (exact fill) or `Loading`; on any
    /// failure nothing changes. Loads on the same drone are serialized;
    /// loads on different drones proceed in parallel.
    pub async fn load(&self, drone_id: DroneId, items: &[MedicationSpec]) -> Result<LoadReceipt> {
        let txn = self.store.begin_load(drone_id).await;

        // 1. Drone must exist
        let drone = txn.drone()?;

        // 2. Only IDLE and LOADING accept cargo; LOADED is a dead end until
        //    an administrative reset
        if !drone.state.accepts_cargo() {
            return Err(DispatchError::InvalidState { state: drone.state });
        }

        // 3. Battery gate
        if drone.battery < MIN_LOADING_BATTERY {
            warn!(
                drone_id = drone_id,
                battery = drone.battery,
                "Load rejected: battery below threshold"
            );
            return Err(DispatchError::InsufficientCharge {
                level: drone.battery,
                threshold: MIN_LOADING_BATTERY,
            });
        }

        // 4. Batch must carry at least one item
        if items.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }

        // 5. Per-item field validation and code uniqueness (within the
        //    batch and against committed medications)
        let mut batch_codes = HashSet::with_capacity(items.len());
        for spec in items {
            spec.validate()?;
            if !batch_codes.insert(spec.code.as_str()) {
                return Err(DispatchError::InvalidField {
                    field: "code",
                    reason: format!("'{}' appears more than once in the batch", spec.code),
                });
            }
            if txn.code_in_use(&spec.code)? {
                return Err(DispatchError::InvalidField {
                    field: "code",
                    reason: format!("'{}' is already in use", spec.code),
                });
            }
        }

        // 6. Capacity check against the committed weight snapshot; stable
        //    because the admission lock is held
        let capacity = f64::from(drone.weight_limit);
        let committed = txn.committed_weight()?;
        let batch_weight: f64 = items.iter().map(|i| i.weight).sum();
        if committed + batch_weight > capacity {
            warn!(
                drone_id = drone_id,
                committed = committed,
                batch_weight = batch_weight,
                limit = drone.weight_limit,
                "Load rejected: capacity exceeded"
            );
            return Err(DispatchError::CapacityExceeded {
                limit: drone.weight_limit,
            });
        }

        let new_total = committed + batch_weight;
        // Exact fill goes LOADED; anything short stays LOADING. This path
        // never returns a drone to IDLE.
        let new_state = if (capacity - new_total).abs() < f64::EPSILON {
            DroneState::Loaded
        } else {
            DroneState::Loading
        };

        let medications: Vec<Medication> = items
            .iter()
            .map(|spec| Medication {
                id: txn.allocate_medication_id(),
                name: spec.name.clone(),
                weight: spec.weight,
                code: spec.code.clone(),
                image_ref: spec.image_ref.clone(),
                drone_id,
            })
            .collect();

        txn.commit(medications.clone(), new_state)?;

        let remaining_capacity = capacity - new_total;
        info!(
            drone_id = drone_id,
            items = medications.len(),
            batch_weight = batch_weight,
            remaining_capacity = remaining_capacity,
            state = %new_state,
            "Load committed"
        );

        Ok(LoadReceipt {
            medications,
            remaining_capacity,
            drone_state: new_state,
        })
    }
}
