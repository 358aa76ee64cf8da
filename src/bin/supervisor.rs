// src/bin/supervisor.rs
// Standalone supervisor process: turns pending orders into jobs and assigns them to idle
// robots, independently of any running simulation.

use std::env;

use log::{error, info};
use shelfbot::dispatch::{FifoDispatcher, Supervisor};
use shelfbot::{HttpBackend, ShelfbotConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("SHELFBOT_CONFIG").ok())
        .unwrap_or_else(|| "shelfbot.yaml".to_string());

    let config = match ShelfbotConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("Supervisor failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let backend = match HttpBackend::new(&config.backend) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Supervisor failed to build backend client: {}", e);
            std::process::exit(1);
        }
    };

    info!("API base URL: {}", config.backend.base_url);
    let supervisor = Supervisor::new(&config.supervisor, backend, FifoDispatcher);
    supervisor.run(|| true);
}
