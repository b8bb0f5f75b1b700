//! Battery audit retention service
//!
//! Records periodic battery-level samples and retires them once past their
//! retention window. Every record (and every sweep that deleted something)
//! sends a signal to the [`PurgeSweeper`], which also wakes on a fixed
//! fallback interval so staleness stays bounded on a quiet fleet. Expired
//! samples are filtered out of reads immediately, so query visibility never
//! depends on sweep latency; the sweeper only reclaims storage.
//!
//! Audits use their own table and lock inside the store, so sweeps never
//! block cargo loading.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::defaults::PURGE_SIGNAL_BUFFER;
use crate::error::Result;
use crate::store::DispatchStore;
use crate::types::{BatteryAudit, DroneId};

/// Signal that audit rows were written or deleted
#[derive(Debug, Clone, Copy)]
pub struct PurgeSignal;

/// Recording and query handle for battery audits
#[derive(Clone)]
pub struct BatteryAuditLog {
    store: Arc<DispatchStore>,
    clock: Arc<dyn Clock>,
    default_ttl_minutes: i64,
    purge_tx: mpsc::Sender<PurgeSignal>,
}

impl BatteryAuditLog {
    /// Create the audit log and its paired sweeper
    pub fn new(
        store: Arc<DispatchStore>,
        clock: Arc<dyn Clock>,
        default_ttl_minutes: i64,
        sweep_interval: Duration,
    ) -> (Self, PurgeSweeper) {
        let (purge_tx, purge_rx) = mpsc::channel(PURGE_SIGNAL_BUFFER);

        let log = Self {
            store: Arc::clone(&store),
            clock: Arc::clone(&clock),
            default_ttl_minutes,
            purge_tx: purge_tx.clone(),
        };
        let sweeper = PurgeSweeper {
            store,
            clock,
            purge_tx,
            purge_rx,
            sweep_interval,
        };
        (log, sweeper)
    }

    /// Record a battery sample with the default retention window
    pub fn record(
        &self,
        drone_id: DroneId,
        battery_level: f64,
        task_name: &str,
    ) -> Result<BatteryAudit> {
        self.record_with_ttl(drone_id, battery_level, task_name, self.default_ttl_minutes)
    }

    /// Record a battery sample with an explicit retention window
    pub fn record_with_ttl(
        &self,
        drone_id: DroneId,
        battery_level: f64,
        task_name: &str,
        ttl_minutes: i64,
    ) -> Result<BatteryAudit> {
        let audit = self.store.append_audit(
            drone_id,
            battery_level,
            task_name.to_string(),
            self.clock.now(),
            ttl_minutes,
        )?;

        debug!(
            drone_id = drone_id,
            battery_level = battery_level,
            task = task_name,
            audit_id = audit.id,
            "Battery audit recorded"
        );

        // Schedule a sweep; a full buffer means one is already pending
        let _ = self.purge_tx.try_send(PurgeSignal);

        Ok(audit)
    }

    /// Delete every sample expired at `now`; returns the deleted count
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let deleted = self.store.purge_expired_audits(now)?;
        if deleted > 0 {
            info!(deleted = deleted, "Expired battery audits purged");
            let _ = self.purge_tx.try_send(PurgeSignal);
        }
        Ok(deleted)
    }

    /// Unexpired samples, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<BatteryAudit>> {
        self.store.recent_audits(self.clock.now(), limit)
    }
}

/// Background task that reclaims expired audit rows
///
/// Wakes on mutation signals from the audit log, or after the fallback
/// interval when the fleet is quiet. Run it with `tokio::spawn`.
pub struct PurgeSweeper {
    store: Arc<DispatchStore>,
    clock: Arc<dyn Clock>,
    purge_tx: mpsc::Sender<PurgeSignal>,
    purge_rx: mpsc::Receiver<PurgeSignal>,
    sweep_interval: Duration,
}

impl PurgeSweeper {
    /// Run the sweep loop until `shutdown` is cancelled
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Purge sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = self.purge_rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    // Coalesce a burst of signals into one sweep
                    while self.purge_rx.try_recv().is_ok() {}
                    self.sweep();
                }
                _ = tokio::time::sleep(self.sweep_interval) => {
                    self.sweep();
                }
            }
        }

        info!("Purge sweeper stopped");
    }

    fn sweep(&self) {
        match self.store.purge_expired_audits(self.clock.now()) {
            Ok(0) => {}
            Ok(deleted) => {
                info!(deleted = deleted, "Sweep deleted expired battery audits");
                // Deletion is itself a mutation: schedule a follow-up sweep
                let _ = self.purge_tx.try_send(PurgeSignal);
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep failed");
            }
        }
    }
}
