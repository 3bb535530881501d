mod config;
mod controller;
mod error;
mod input;
mod net;
mod physics;
mod sensor;
mod sim;
mod spawn;
mod state;
mod vehicle;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::{SensorSource, ServerConfig};
use crate::controller::VehicleController;
use crate::input::InputFusion;
use crate::net::{Hub, start_websocket_server};
use crate::sim::Simulation;
use crate::state::SharedGameState;
use crate::vehicle::{TOY_CAR, VehicleTemplate};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ar_drive_server=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("starting ar-drive server: {:?}", config);

    let template = match &config.template_path {
        Some(path) => VehicleTemplate::load(path)?,
        None => VehicleTemplate::default(),
    };
    // catch a broken asset at startup; spawns would fail anyway
    if let Err(err) = template.resolve() {
        warn!("vehicle template is unusable, every spawn will fail: {err}");
    }

    let state = Arc::new(Mutex::new(SharedGameState::new()));
    let input = InputFusion::shared();
    let (world_tx, mut world_rx) = mpsc::unbounded_channel();

    let hub = Hub {
        state: Arc::clone(&state),
        input: Arc::clone(&input),
        world: world_tx,
        sensor_hz: config.sensor_hz,
    };
    let bind = config.bind.clone();
    let mut server = tokio::spawn(async move { start_websocket_server(&bind, hub).await });

    if config.sensor == SensorSource::Simulated {
        tokio::spawn(sensor::run_simulated_sensor(
            Arc::clone(&input),
            config.sensor_period(),
        ));
    }

    let mut sim = Simulation::new(VehicleController::new(TOY_CAR, template), config.dt());

    // Fixed timestep
    let mut ticker = interval(config.tick_period());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            finished = &mut server => {
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => {
                        error!("websocket server stopped: {err}");
                        Err(err.into())
                    }
                    Err(join) => Err(join.into()),
                };
            }
        }

        let reports = sim.drain(&mut world_rx);

        let controls = input.lock().await.snapshot();
        sim.tick(&controls);

        let mut game = state.lock().await;
        game.deliver_reports(reports);

        // Advance tick + broadcast snapshot
        game.tick += 1;
        game.broadcast_snapshot(controls, sim.controller.active(), &sim.physics.bodies);
    }
}
