//! Telemetry retention integration tests
//!
//! The retention window property end to end: a sample with a 5-minute TTL
//! is visible just before expiry, invisible just after, and physically
//! reclaimed by the sweeper without touching unexpired samples.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use drone_dispatch::{
    BatteryAuditLog, Clock, DispatchStore, DroneId, DroneModel, DroneRegistry, DroneSpec,
    ManualClock, PurgeSweeper, SystemClock,
};

fn make_fixture(
    clock: Arc<dyn Clock>,
) -> (Arc<DispatchStore>, BatteryAuditLog, PurgeSweeper, DroneId) {
    let store = Arc::new(DispatchStore::new());
    let registry = DroneRegistry::new(Arc::clone(&store));
    let drone = registry
        .register(DroneSpec {
            serial: "DRN-001".to_string(),
            model: DroneModel::Middleweight,
            weight_limit: 250,
            battery: 75.0,
        })
        .unwrap();

    let (log, sweeper) =
        BatteryAuditLog::new(Arc::clone(&store), clock, 5, Duration::from_millis(50));
    (store, log, sweeper, drone.id)
}

#[tokio::test]
async fn test_five_minute_window_boundaries() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (_store, log, _sweeper, drone_id) = make_fixture(Arc::clone(&clock) as Arc<dyn Clock>);

    log.record(drone_id, 75.0, "battery_check").unwrap();

    // T+4m59s: still visible
    clock.advance(ChronoDuration::minutes(4) + ChronoDuration::seconds(59));
    assert_eq!(log.recent(10).unwrap().len(), 1);

    // T+5m1s: gone from query results
    clock.advance(ChronoDuration::seconds(2));
    assert!(log.recent(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_expired_deletes_and_counts() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (store, log, _sweeper, drone_id) = make_fixture(Arc::clone(&clock) as Arc<dyn Clock>);
    let start = clock.now();

    for i in 0..3 {
        log.record_with_ttl(drone_id, 75.0 - f64::from(i), "battery_check", 5)
            .unwrap();
    }
    log.record_with_ttl(drone_id, 70.0, "battery_check", 30)
        .unwrap();

    let deleted = log
        .purge_expired(start + ChronoDuration::minutes(5) + ChronoDuration::seconds(1))
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(store.audit_count().unwrap(), 1);

    // Repeat purge finds nothing new
    let deleted = log
        .purge_expired(start + ChronoDuration::minutes(5) + ChronoDuration::seconds(1))
        .unwrap();
    assert_eq!(deleted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_sweep_reclaims_without_new_mutations() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (store, log, sweeper, drone_id) = make_fixture(Arc::clone(&clock) as Arc<dyn Clock>);

    log.record(drone_id, 75.0, "battery_check").unwrap();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(sweeper.run(shutdown.clone()));

    // Expire the sample and wait for the fallback interval alone to fire;
    // no further records arrive
    clock.advance(ChronoDuration::minutes(6));

    let mut reclaimed = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if store.audit_count().unwrap() == 0 {
            reclaimed = true;
            break;
        }
    }
    assert!(reclaimed, "interval sweep did not reclaim the expired sample");

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_real_clock_records_are_immediately_visible() {
    let (_store, log, _sweeper, drone_id) = make_fixture(Arc::new(SystemClock));

    let audit = log.record(drone_id, 75.0, "battery_check").unwrap();
    assert_eq!(audit.ttl_minutes, 5);
    assert_eq!(audit.expires_at(), audit.recorded_at + ChronoDuration::minutes(5));

    let recent = log.recent(10).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].drone_id, drone_id);
}
