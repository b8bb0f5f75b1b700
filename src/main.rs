//! Drone Dispatch - fleet cargo dispatch core
//!
//! Demo process: wires the dispatch service, registers a small fleet, and
//! drives it with a simulated load/drain workload until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Run with the built-in demo fleet
//! cargo run --release
//!
//! # Faster simulation tick
//! cargo run --release -- --tick-secs 1
//! ```
//!
//! # Environment Variables
//!
//! - `DISPATCH_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use drone_dispatch::{
    DispatchConfig, DispatchService, DroneModel, DroneSpec, MedicationSpec, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "drone-dispatch", about = "Drone fleet cargo dispatch core")]
struct Args {
    /// Seconds between simulated load attempts
    #[arg(long, default_value_t = 5)]
    tick_secs: u64,

    /// Number of demo drones to register
    #[arg(long, default_value_t = 4)]
    fleet_size: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = DispatchConfig::load().context("Failed to load configuration")?;
    info!(?config, "Starting drone dispatch core");

    let mut service = DispatchService::new(config, Arc::new(SystemClock));
    register_demo_fleet(&service, args.fleet_size)?;

    let shutdown = CancellationToken::new();
    let mut tasks = service
        .spawn_background(shutdown.clone())
        .context("Failed to spawn background tasks")?;

    let service = Arc::new(service);
    {
        let service = Arc::clone(&service);
        let shutdown = shutdown.clone();
        let tick = Duration::from_secs(args.tick_secs.max(1));
        tokio::spawn(async move { simulate_workload(service, tick, shutdown).await });
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    shutdown.cancel();
    while tasks.join_next().await.is_some() {}
    info!("Drone dispatch core stopped");
    Ok(())
}

/// Register a demo fleet with mixed models and capacities
fn register_demo_fleet(service: &DispatchService, fleet_size: u32) -> Result<()> {
    let models = [
        (DroneModel::Lightweight, 125),
        (DroneModel::Middleweight, 250),
        (DroneModel::Cruiserweight, 375),
        (DroneModel::Heavyweight, 500),
    ];

    for i in 0..fleet_size {
        let (model, weight_limit) = models[i as usize % models.len()];
        service.registry().register(DroneSpec {
            serial: format!("DRN-{:03}", i + 1),
            model,
            weight_limit,
            battery: 100.0,
        })?;
    }
    Ok(())
}

/// Drive the fleet with random load attempts and battery drain
async fn simulate_workload(
    service: Arc<DispatchService>,
    tick: Duration,
    shutdown: CancellationToken,
) {
    let mut batch_no: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(tick) => {}
        }

        let drones = match service.query().fleet() {
            Ok(drones) => drones,
            Err(e) => {
                warn!(error = %e, "Could not list fleet");
                continue;
            }
        };

        for drone in drones {
            let (weight, drain) = {
                let mut rng = rand::thread_rng();
                (
                    rng.gen_range(10.0..80.0_f64).round(),
                    rng.gen_range(0.5..3.0_f64),
                )
            };
            batch_no += 1;

            let items = [MedicationSpec {
                name: format!("Shipment-{}", batch_no),
                weight,
                code: format!("SHP_{:06}", batch_no),
                image_ref: None,
            }];

            match service.loader().load(drone.id, &items).await {
                Ok(receipt) => info!(
                    drone_id = drone.id,
                    weight = weight,
                    remaining = receipt.remaining_capacity,
                    state = %receipt.drone_state,
                    "Simulated load accepted"
                ),
                Err(e) => info!(drone_id = drone.id, reason = %e, "Simulated load rejected"),
            }

            // Batteries drain a little every tick
            let _ = service
                .store()
                .set_battery(drone.id, drone.battery - drain);
        }
    }
}
