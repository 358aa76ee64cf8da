// src/main.rs
// Robot controller process: loads configuration, connects to the backend and runs the
// fixed-rate control loop until the simulation stops.

use std::env;

use log::{error, info};
use nalgebra::Vector2;
use shelfbot::{HttpBackend, Robot, Shelfbot, ShelfbotConfig, SimRobot};

const DEFAULT_CONFIG: &str = "shelfbot.yaml";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("Shelfbot failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), shelfbot::ShelfbotError> {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var("SHELFBOT_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = ShelfbotConfig::load_or_default(&path)?;
    info!("Starting Shelfbot {} against {}", config.robot.name, config.backend.base_url);

    let backend = HttpBackend::new(&config.backend)?;

    // Kinematic stand-in for the simulator, parked at the dock facing +x.
    let mut robot = SimRobot::new(config.robot.time_step_ms).with_pose(Vector2::new(2.96, -3.06), 0.0);

    let mut controller = Shelfbot::new(&config, backend);
    controller.initialize(&robot);

    while robot.step() {
        controller.run_cycle(&mut robot);
    }

    let status = controller.status();
    info!(
        "Simulation ended at {:.1}s; job in progress: {}, battery {}%",
        robot.time(),
        status.job_in_progress,
        status.battery
    );
    Ok(())
}
