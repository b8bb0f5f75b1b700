//! Stub periodic battery sampler
//!
//! Stands in for real telemetry acquisition: once per tick it walks the
//! fleet and records one battery audit per drone through the retention
//! service, logging each level. The tick interval is configuration, not
//! contract; a production deployment replaces this task with a real
//! telemetry feed calling [`BatteryAuditLog::record`] directly.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::store::DispatchStore;
use crate::telemetry::BatteryAuditLog;

/// Task name stamped on samples recorded by this sampler
pub const SAMPLER_TASK_NAME: &str = "battery_check";

/// Periodic fleet-wide battery sampler
pub struct BatterySampler {
    store: Arc<DispatchStore>,
    audit_log: BatteryAuditLog,
    interval: Duration,
}

impl BatterySampler {
    /// Create a sampler over the shared store and audit log
    pub fn new(store: Arc<DispatchStore>, audit_log: BatteryAuditLog, interval: Duration) -> Self {
        Self {
            store,
            audit_log,
            interval,
        }
    }

    /// Run the sampling loop until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Battery sampler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    self.sample_fleet();
                }
            }
        }

        info!("Battery sampler stopped");
    }

    /// Record one audit per registered drone
    pub fn sample_fleet(&self) {
        let drones = match self.store.drones() {
            Ok(drones) => drones,
            Err(e) => {
                error!(error = %e, "Sampler could not list drones");
                return;
            }
        };

        for drone in drones {
            info!(
                drone_id = drone.id,
                serial = %drone.serial,
                battery = drone.battery,
                "Drone battery level"
            );
            if let Err(e) =
                self.audit_log
                    .record(drone.id, drone.battery, SAMPLER_TASK_NAME)
            {
                // A drone deleted between the listing and the record is the
                // only expected failure here
                error!(drone_id = drone.id, error = %e, "Battery audit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, SystemClock};
    use crate::types::{DroneModel, DroneSpec};
    use crate::registry::DroneRegistry;

    #[tokio::test]
    async fn test_sample_fleet_records_one_audit_per_drone() {
        let store = Arc::new(DispatchStore::new());
        let registry = DroneRegistry::new(Arc::clone(&store));
        for serial in ["A", "B", "C"] {
            registry
                .register(DroneSpec {
                    serial: serial.to_string(),
                    model: DroneModel::Lightweight,
                    weight_limit: 100,
                    battery: 60.0,
                })
                .unwrap();
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (log, _sweeper) = BatteryAuditLog::new(
            Arc::clone(&store),
            clock,
            5,
            Duration::from_secs(30),
        );
        let sampler = BatterySampler::new(Arc::clone(&store), log.clone(), Duration::from_secs(60));

        sampler.sample_fleet();
        sampler.sample_fleet();

        let audits = log.recent(100).unwrap();
        assert_eq!(audits.len(), 6);
        assert!(audits.iter().all(|a| a.task_name == SAMPLER_TASK_NAME));
    }
}
