//! Drone Dispatch Core
//!
//! Capacity-allocation and state-transition engine for a fleet of
//! capacity-constrained drones carrying medications.
//!
//! ## Architecture
//!
//! - **Registry**: drone registration, lookup, availability listing
//! - **Capacity Ledger**: committed-weight reads over attached cargo
//! - **Loading Engine**: admission checks and atomic batch commit with the
//!   per-drone state transition
//! - **Telemetry Retention**: battery audit recording with TTL-based expiry
//!   and a background purge sweeper
//! - **Query Façade**: read-only fleet projections
//!
//! The HTTP layer and real telemetry acquisition are external
//! collaborators; this crate is the engine they call into.

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod loading;
pub mod query;
pub mod registry;
pub mod sampler;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export the service surface
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DispatchConfig;
pub use error::{DispatchError, Result};
pub use ledger::CapacityLedger;
pub use loading::CargoLoader;
pub use query::FleetQuery;
pub use registry::DroneRegistry;
pub use sampler::BatterySampler;
pub use service::DispatchService;
pub use store::{DispatchStore, LoadTransaction};
pub use telemetry::{BatteryAuditLog, PurgeSweeper};

// Re-export domain types
pub use types::{
    AuditId, BatteryAudit, Drone, DroneId, DroneModel, DroneSpec, DroneState, LoadReceipt,
    Medication, MedicationId, MedicationSpec,
};
