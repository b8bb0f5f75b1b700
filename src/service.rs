//! Dispatch service — per-process wiring of the core components
//!
//! One `DispatchService` is constructed per process with its storage and
//! clock injected; there are no module-level registries or hidden
//! singletons. Background work (retention sweeper, stub sampler) is spawned
//! explicitly and stopped through a `CancellationToken`.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::ledger::CapacityLedger;
use crate::loading::CargoLoader;
use crate::query::FleetQuery;
use crate::registry::DroneRegistry;
use crate::sampler::BatterySampler;
use crate::store::DispatchStore;
use crate::telemetry::{BatteryAuditLog, PurgeSweeper};

/// The assembled dispatch core
pub struct DispatchService {
    store: Arc<DispatchStore>,
    config: DispatchConfig,
    registry: DroneRegistry,
    ledger: CapacityLedger,
    loader: CargoLoader,
    audit_log: BatteryAuditLog,
    query: FleetQuery,
    /// Taken by the first `spawn_background` call
    sweeper: Option<PurgeSweeper>,
}

impl DispatchService {
    /// Assemble the service over a fresh store
    pub fn new(config: DispatchConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(DispatchStore::new()), config, clock)
    }

    /// Assemble the service over an existing store
    pub fn with_store(
        store: Arc<DispatchStore>,
        config: DispatchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (audit_log, sweeper) = BatteryAuditLog::new(
            Arc::clone(&store),
            clock,
            config.audit_ttl_minutes,
            Duration::from_secs(config.purge_sweep_interval_secs),
        );

        Self {
            registry: DroneRegistry::new(Arc::clone(&store)),
            ledger: CapacityLedger::new(Arc::clone(&store)),
            loader: CargoLoader::new(Arc::clone(&store)),
            query: FleetQuery::new(Arc::clone(&store)),
            audit_log,
            sweeper: Some(sweeper),
            store,
            config,
        }
    }

    /// Drone registration and lookup
    pub fn registry(&self) -> &DroneRegistry {
        &self.registry
    }

    /// Committed-weight reads
    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// Cargo loading engine
    pub fn loader(&self) -> &CargoLoader {
        &self.loader
    }

    /// Battery audit recording and queries
    pub fn audit_log(&self) -> &BatteryAuditLog {
        &self.audit_log
    }

    /// Read-only fleet projections
    pub fn query(&self) -> &FleetQuery {
        &self.query
    }

    /// Shared store handle (for wiring additional collaborators)
    pub fn store(&self) -> Arc<DispatchStore> {
        Arc::clone(&self.store)
    }

    /// Active configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Spawn the retention sweeper and the stub battery sampler
    ///
    /// Tasks run until `shutdown` is cancelled. Returns the `JoinSet` so the
    /// caller can await clean termination. Calling this twice is an error:
    /// the sweeper can only run once.
    pub fn spawn_background(
        &mut self,
        shutdown: CancellationToken,
    ) -> anyhow::Result<JoinSet<()>> {
        let sweeper = self
            .sweeper
            .take()
            .ok_or_else(|| anyhow::anyhow!("background tasks already spawned"))?;

        let mut tasks = JoinSet::new();
        tasks.spawn(sweeper.run(shutdown.clone()));

        let sampler = BatterySampler::new(
            self.store(),
            self.audit_log.clone(),
            Duration::from_secs(self.config.sampler_interval_secs),
        );
        tasks.spawn(sampler.run(shutdown));

        info!("Dispatch background tasks spawned");
        Ok(tasks)
    }
}
