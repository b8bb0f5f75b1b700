//! Dispatch store — committed fleet state and transaction boundaries
//!
//! The store holds the committed records (drones, medications, battery
//! audits) behind reader-writer locks and owns the per-drone admission lock
//! table. Readers always see fully committed state: a load batch becomes
//! visible in a single exclusive write section or not at all.
//!
//! Two locking layers with distinct jobs:
//! - a per-drone `tokio::sync::Mutex` (the *admission lock*) serializes
//!   capacity check through state write for one drone, held across the whole
//!   [`LoadTransaction`];
//! - the fleet `RwLock` guards the tables themselves and is only held for
//!   the duration of a single read or the final commit.
//!
//! Battery audits live in their own table with their own lock, so retention
//! sweeps never contend with loading.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use chrono::{DateTime, Utc};

use crate::error::{DispatchError, Result};
use crate::types::{
    AuditId, BatteryAudit, Drone, DroneId, DroneModel, DroneState, Medication, MedicationId,
};

/// Committed fleet tables: drones, medications, and the code index
#[derive(Default)]
struct FleetTables {
    drones: HashMap<DroneId, Drone>,
    medications: HashMap<MedicationId, Medication>,
    /// Medication codes in use, for the global-uniqueness check
    codes: HashSet<String>,
}

impl FleetTables {
    /// Sum of medication weights attached to a drone
    fn committed_weight(&self, drone_id: DroneId) -> f64 {
        self.medications
            .values()
            .filter(|m| m.drone_id == drone_id)
            .map(|m| m.weight)
            .sum()
    }
}

/// In-process transactional store for the dispatch core
///
/// Stands in for the external persistent store the core assumes: per-entity
/// exclusive locking scoped to a logical transaction, commit-or-discard on
/// every exit path.
pub struct DispatchStore {
    fleet: RwLock<FleetTables>,
    audits: RwLock<BTreeMap<AuditId, BatteryAudit>>,
    /// Admission lock per drone; entries are created on first load and live
    /// for the drone's lifetime
    admission_locks: DashMap<DroneId, Arc<Mutex<()>>>,
    next_drone_id: AtomicU64,
    next_medication_id: AtomicU64,
    next_audit_id: AtomicU64,
}

impl DispatchStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            fleet: RwLock::new(FleetTables::default()),
            audits: RwLock::new(BTreeMap::new()),
            admission_locks: DashMap::new(),
            next_drone_id: AtomicU64::new(1),
            next_medication_id: AtomicU64::new(1),
            next_audit_id: AtomicU64::new(1),
        }
    }

    // ------------------------------------------------------------------
    // Drones
    // ------------------------------------------------------------------

    /// Insert a new drone record, enforcing serial uniqueness
    pub fn insert_drone(
        &self,
        serial: String,
        model: DroneModel,
        weight_limit: u32,
        battery: f64,
    ) -> Result<Drone> {
        let mut fleet = self
            .fleet
            .write()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        if fleet.drones.values().any(|d| d.serial == serial) {
            return Err(DispatchError::DuplicateSerial(serial));
        }

        let id = self.next_drone_id.fetch_add(1, Ordering::SeqCst);
        let drone = Drone {
            id,
            serial,
            model,
            weight_limit,
            battery,
            state: DroneState::Idle,
        };
        fleet.drones.insert(id, drone.clone());
        Ok(drone)
    }

    /// Fetch a drone snapshot by id
    pub fn drone(&self, drone_id: DroneId) -> Result<Drone> {
        let fleet = self
            .fleet
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        fleet
            .drones
            .get(&drone_id)
            .cloned()
            .ok_or(DispatchError::DroneNotFound(drone_id))
    }

    /// Snapshot of every registered drone, ordered by id
    pub fn drones(&self) -> Result<Vec<Drone>> {
        let fleet = self
            .fleet
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let mut drones: Vec<Drone> = fleet.drones.values().cloned().collect();
        drones.sort_by_key(|d| d.id);
        Ok(drones)
    }

    /// Update a drone's battery level (telemetry sampler write path)
    pub fn set_battery(&self, drone_id: DroneId, battery: f64) -> Result<()> {
        let mut fleet = self
            .fleet
            .write()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let drone = fleet
            .drones
            .get_mut(&drone_id)
            .ok_or(DispatchError::DroneNotFound(drone_id))?;
        drone.battery = battery.clamp(0.0, 100.0);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Medications
    // ------------------------------------------------------------------

    /// Medications attached to a drone, ordered by id
    ///
    /// Fails `DroneNotFound` for an absent drone; a drone without cargo
    /// yields an empty vec.
    pub fn medications_for(&self, drone_id: DroneId) -> Result<Vec<Medication>> {
        let fleet = self
            .fleet
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        if !fleet.drones.contains_key(&drone_id) {
            return Err(DispatchError::DroneNotFound(drone_id));
        }
        let mut meds: Vec<Medication> = fleet
            .medications
            .values()
            .filter(|m| m.drone_id == drone_id)
            .cloned()
            .collect();
        meds.sort_by_key(|m| m.id);
        Ok(meds)
    }

    /// Committed weight for a drone (fails `DroneNotFound` if absent)
    pub fn committed_weight(&self, drone_id: DroneId) -> Result<f64> {
        let fleet = self
            .fleet
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        if !fleet.drones.contains_key(&drone_id) {
            return Err(DispatchError::DroneNotFound(drone_id));
        }
        Ok(fleet.committed_weight(drone_id))
    }

    /// Whether a medication code is already in use
    pub fn code_in_use(&self, code: &str) -> Result<bool> {
        let fleet = self
            .fleet
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        Ok(fleet.codes.contains(code))
    }

    /// Allocate an id for a medication staged in a transaction
    pub(crate) fn allocate_medication_id(&self) -> MedicationId {
        self.next_medication_id.fetch_add(1, Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Load transactions
    // ------------------------------------------------------------------

    /// Begin a load transaction for one drone
    ///
    /// Acquires the drone's admission lock; the returned handle holds it
    /// until commit or drop. Dropping the handle without committing discards
    /// all staged work; nothing reaches the tables.
    pub async fn begin_load(self: &Arc<Self>, drone_id: DroneId) -> LoadTransaction {
        let lock = self
            .admission_locks
            .entry(drone_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        debug!(drone_id = drone_id, "Load transaction started");
        LoadTransaction {
            store: Arc::clone(self),
            drone_id,
            _guard: guard,
        }
    }

    // ------------------------------------------------------------------
    // Battery audits
    // ------------------------------------------------------------------

    /// Append a battery audit record
    pub fn append_audit(
        &self,
        drone_id: DroneId,
        battery_level: f64,
        task_name: String,
        recorded_at: DateTime<Utc>,
        ttl_minutes: i64,
    ) -> Result<BatteryAudit> {
        // Existence check against the fleet table; the audit table itself
        // has no foreign keys
        self.drone(drone_id)?;

        let mut audits = self
            .audits
            .write()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let id = self.next_audit_id.fetch_add(1, Ordering::SeqCst);
        let audit = BatteryAudit {
            id,
            drone_id,
            battery_level,
            task_name,
            recorded_at,
            ttl_minutes,
        };
        audits.insert(id, audit.clone());
        Ok(audit)
    }

    /// Delete every audit expired at `now`; returns how many were removed
    pub fn purge_expired_audits(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut audits = self
            .audits
            .write()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let expired: Vec<AuditId> = audits
            .values()
            .filter(|a| a.is_expired(now))
            .map(|a| a.id)
            .collect();
        for id in &expired {
            audits.remove(id);
        }
        Ok(expired.len())
    }

    /// Unexpired audits at `now`, newest first, up to `limit`
    pub fn recent_audits(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BatteryAudit>> {
        let audits = self
            .audits
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        Ok(audits
            .values()
            .rev()
            .filter(|a| !a.is_expired(now))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Total number of stored audits, expired or not (sweeper bookkeeping)
    pub fn audit_count(&self) -> Result<usize> {
        let audits = self
            .audits
            .read()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        Ok(audits.len())
    }
}

impl Default for DispatchStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive per-drone load scope
///
/// Holds the drone's admission lock from the capacity-check read through the
/// state-transition write. `commit` applies the staged batch in one
/// exclusive section; dropping the transaction without committing is a
/// rollback.
pub struct LoadTransaction {
    store: Arc<DispatchStore>,
    drone_id: DroneId,
    _guard: OwnedMutexGuard<()>,
}

impl LoadTransaction {
    /// The drone this transaction is scoped to
    pub fn drone_id(&self) -> DroneId {
        self.drone_id
    }

    /// Committed snapshot of the locked drone
    pub fn drone(&self) -> Result<Drone> {
        self.store.drone(self.drone_id)
    }

    /// Committed weight for the locked drone
    ///
    /// Stable for the lifetime of this transaction: no other load can touch
    /// this drone while the admission lock is held.
    pub fn committed_weight(&self) -> Result<f64> {
        self.store.committed_weight(self.drone_id)
    }

    /// Whether a code is taken by any committed medication
    pub fn code_in_use(&self, code: &str) -> Result<bool> {
        self.store.code_in_use(code)
    }

    /// Allocate an id for a staged medication
    pub fn allocate_medication_id(&self) -> MedicationId {
        self.store.allocate_medication_id()
    }

    /// Apply the staged batch and state transition as one atomic unit
    ///
    /// Re-verifies code uniqueness under the write lock: a load on a
    /// different drone may have claimed a code after this transaction's
    /// read-phase check. On any error nothing is applied.
    pub fn commit(self, medications: Vec<Medication>, new_state: DroneState) -> Result<()> {
        let mut fleet = self
            .store
            .fleet
            .write()
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        if !fleet.drones.contains_key(&self.drone_id) {
            return Err(DispatchError::Internal(format!(
                "drone {} disappeared during load transaction",
                self.drone_id
            )));
        }

        for med in &medications {
            if fleet.codes.contains(&med.code) {
                return Err(DispatchError::InvalidField {
                    field: "code",
                    reason: format!("'{}' is already in use", med.code),
                });
            }
        }

        for med in medications {
            fleet.codes.insert(med.code.clone());
            fleet.medications.insert(med.id, med);
        }
        if let Some(drone) = fleet.drones.get_mut(&self.drone_id) {
            drone.state = new_state;
        }

        debug!(drone_id = self.drone_id, state = %new_state, "Load transaction committed");
        Ok(())
    }
}
