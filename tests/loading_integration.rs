//! Loading engine integration tests
//!
//! End-to-end properties of the admission engine: capacity conservation,
//! state transitions, and serialization of concurrent loads against one
//! drone.

use std::sync::Arc;

use drone_dispatch::{
    CargoLoader, DispatchError, DispatchStore, DroneId, DroneModel, DroneRegistry, DroneSpec,
    DroneState, MedicationSpec,
};

fn make_fleet() -> (Arc<DispatchStore>, DroneRegistry, CargoLoader) {
    let store = Arc::new(DispatchStore::new());
    (
        Arc::clone(&store),
        DroneRegistry::new(Arc::clone(&store)),
        CargoLoader::new(store),
    )
}

fn register(registry: &DroneRegistry, serial: &str, limit: u32, battery: f64) -> DroneId {
    registry
        .register(DroneSpec {
            serial: serial.to_string(),
            model: DroneModel::Heavyweight,
            weight_limit: limit,
            battery,
        })
        .unwrap()
        .id
}

fn item(code: &str, weight: f64) -> MedicationSpec {
    MedicationSpec {
        name: format!("Med-{}", code),
        weight,
        code: code.to_string(),
        image_ref: None,
    }
}

#[tokio::test]
async fn test_fill_exactly_then_reject_everything() {
    let (store, registry, loader) = make_fleet();
    let id = register(&registry, "DRN-001", 500, 90.0);

    // The worked example: [200, 300] on an empty 500-limit drone
    let receipt = loader
        .load(id, &[item("MED_A", 200.0), item("MED_B", 300.0)])
        .await
        .unwrap();

    assert_eq!(receipt.drone_state, DroneState::Loaded);
    assert_eq!(receipt.remaining_capacity, 0.0);
    assert_eq!(receipt.medications.len(), 2);
    assert_eq!(store.committed_weight(id).unwrap(), 500.0);

    // Any further load fails on the state gate: LOADED never accepts
    let err = loader.load(id, &[item("MED_C", 0.5)]).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::InvalidState {
            state: DroneState::Loaded
        }
    );
}

#[tokio::test]
async fn test_committed_weight_tracks_created_cargo() {
    let (store, registry, loader) = make_fleet();
    let id = register(&registry, "DRN-001", 400, 90.0);

    let weights = [50.0, 75.5, 100.0, 25.25];
    let mut expected = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        let receipt = loader
            .load(id, &[item(&format!("SEQ_{}", i), *weight)])
            .await
            .unwrap();
        expected += weight;

        assert_eq!(store.committed_weight(id).unwrap(), expected);
        assert_eq!(receipt.remaining_capacity, 400.0 - expected);
        assert!(expected <= 400.0);
        assert_eq!(receipt.drone_state, DroneState::Loading);
    }

    // Manifest matches the cargo that was actually created
    let manifest = store.medications_for(id).unwrap();
    assert_eq!(manifest.len(), weights.len());
    let manifest_total: f64 = manifest.iter().map(|m| m.weight).sum();
    assert_eq!(manifest_total, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_never_overshoot() {
    let (store, registry, loader) = make_fleet();
    let id = register(&registry, "DRN-001", 450, 90.0);

    // Ten batches of 100 each individually fit, but only four can commit
    // before the next would overshoot the 450 limit
    let mut handles = Vec::new();
    for i in 0..10 {
        let loader = loader.clone();
        handles.push(tokio::spawn(async move {
            loader.load(id, &[item(&format!("PAR_{}", i), 100.0)]).await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                accepted += 1;
                assert!(receipt.remaining_capacity >= 0.0);
            }
            Err(DispatchError::CapacityExceeded { limit }) => {
                rejected += 1;
                assert_eq!(limit, 450);
            }
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(accepted, 4);
    assert_eq!(rejected, 6);
    assert_eq!(store.committed_weight(id).unwrap(), 400.0);
    assert_eq!(store.drone(id).unwrap().state, DroneState::Loading);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exact_fill_closes_the_drone() {
    let (store, registry, loader) = make_fleet();
    let id = register(&registry, "DRN-001", 500, 90.0);

    // Five of these fill the drone exactly; later arrivals hit the state
    // gate because the drone is already LOADED
    let mut handles = Vec::new();
    for i in 0..10 {
        let loader = loader.clone();
        handles.push(tokio::spawn(async move {
            loader.load(id, &[item(&format!("FIL_{}", i), 100.0)]).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(DispatchError::InvalidState { state }) => {
                assert_eq!(state, DroneState::Loaded);
            }
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(accepted, 5);
    assert_eq!(store.committed_weight(id).unwrap(), 500.0);
    assert_eq!(store.drone(id).unwrap().state, DroneState::Loaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_on_different_drones_all_commit() {
    let (store, registry, loader) = make_fleet();

    let mut handles = Vec::new();
    for i in 0..8 {
        let id = register(&registry, &format!("DRN-{:03}", i), 200, 90.0);
        let loader = loader.clone();
        handles.push(tokio::spawn(async move {
            (id, loader.load(id, &[item(&format!("IND_{}", i), 150.0)]).await)
        }));
    }

    for handle in handles {
        let (id, result) = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(store.committed_weight(id).unwrap(), 150.0);
    }
}

#[tokio::test]
async fn test_failed_batch_has_zero_side_effects() {
    let (store, registry, loader) = make_fleet();
    let id = register(&registry, "DRN-001", 100, 90.0);

    loader.load(id, &[item("KEEP", 40.0)]).await.unwrap();

    // Second item of the batch busts the limit: the first must not stick
    let err = loader
        .load(id, &[item("PART_A", 30.0), item("PART_B", 40.0)])
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::CapacityExceeded { limit: 100 });

    assert_eq!(store.committed_weight(id).unwrap(), 40.0);
    assert_eq!(store.medications_for(id).unwrap().len(), 1);
    assert!(!store.code_in_use("PART_A").unwrap());
    assert_eq!(store.drone(id).unwrap().state, DroneState::Loading);
}

#[tokio::test]
async fn test_battery_gate_exact_threshold() {
    let (_, registry, loader) = make_fleet();

    let low = register(&registry, "LOW", 500, 24.99);
    assert!(matches!(
        loader.load(low, &[item("L1", 10.0)]).await.unwrap_err(),
        DispatchError::InsufficientCharge { .. }
    ));

    let edge = register(&registry, "EDGE", 500, 25.0);
    assert!(loader.load(edge, &[item("E1", 10.0)]).await.is_ok());
}
