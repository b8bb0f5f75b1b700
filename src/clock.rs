//! Clock abstraction for time-dependent services
//!
//! The telemetry retention service and the load path both stamp records with
//! the current time. Injecting the clock keeps expiry behavior testable and
//! replayable instead of hiding `Utc::now()` calls inside the services.

use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Source of the current wall-clock time
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks.
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and replay runs
///
/// Starts at a fixed instant and only moves when told to.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock pinned at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.write() {
            *now = *now + by;
        }
    }

    /// Jump the clock to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        // A poisoned lock can only come from a panicked writer; fall back to
        // the poisoned value rather than propagate from a time read.
        match self.now.read() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
