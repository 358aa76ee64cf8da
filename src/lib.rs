//! Shelfbot - warehouse pick-and-deliver controller
//!
//! This library drives a mobile manipulator inside a physics simulation. It polls the
//! warehouse backend for an assigned job, turns the job into a scripted plan of
//! moves, turns, rotations and pick batches, executes the plan tick by tick against
//! the simulated robot, and reports progress and completion back to the backend.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod backend;
pub mod core;
pub mod device;
pub mod dispatch;
pub mod manipulation;
pub mod navigation;

use std::collections::BTreeMap;
use std::path::Path;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export commonly used items for easier access
pub use backend::{Backend, BackendError, HttpBackend};
pub use crate::core::{Job, JobManager, RobotRuntimeState, SlotInventory};
pub use device::{Robot, SimRobot};
pub use manipulation::{PickProfile, PickSequencer};
pub use navigation::{Plan, StepOutcome, WaypointInterpreter, WaypointStep};

/// Main configuration structure for Shelfbot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfbotConfig {
    /// Robot identity and physical constants
    pub robot: RobotConfig,
    /// Backend connection
    pub backend: BackendConfig,
    /// Drive parameters
    pub navigation: NavigationConfig,
    /// Job polling
    pub jobs: JobConfig,
    /// Scripted route template
    pub route: Vec<navigation::RouteStep>,
    /// Pick choreographies
    pub manipulation: ManipulationConfig,
    /// Supervisor service
    pub supervisor: SupervisorConfig,
}

/// Robot identity and physical constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Robot name, used as its identity on the backend
    pub name: String,
    /// Simulation step length in milliseconds
    pub time_step_ms: u64,
    /// Battery percentage consumed per job
    pub battery_drain_per_job: f64,
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, without the `/warehouse` prefix
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Drive parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Wheel speed for straight moves
    pub drive_speed: f64,
    /// Wheel speed for in-place turns
    pub rotate_speed: f64,
    /// Distance at which a move target counts as reached
    pub goal_tolerance: f64,
}

/// Job polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Seconds of simulation time between polls while idle
    pub poll_interval_secs: f64,
    /// Item this robot fetches
    pub item_name: String,
    /// Shelf the items are picked from
    pub shelf_name: String,
}

/// Pick choreography settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManipulationConfig {
    /// Hold after zeroing every joint before a pick
    pub reset_hold_secs: f64,
    /// Profiles keyed by slot id
    pub profiles: BTreeMap<u32, PickProfile>,
}

/// Supervisor service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Seconds between dispatch cycles
    pub check_interval_secs: u64,
    /// Sleep between interval checks
    pub idle_sleep_ms: u64,
}

impl Default for ShelfbotConfig {
    fn default() -> Self {
        ShelfbotConfig {
            robot: RobotConfig::default(),
            backend: BackendConfig::default(),
            navigation: NavigationConfig::default(),
            jobs: JobConfig::default(),
            route: navigation::planner::default_route(),
            manipulation: ManipulationConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            name: "youbot".to_string(),
            time_step_ms: 32,
            battery_drain_per_job: 5.0,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://localhost:4000".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            drive_speed: 5.0,
            rotate_speed: 8.0,
            goal_tolerance: 0.1,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            poll_interval_secs: 10.0,
            item_name: "Can".to_string(),
            shelf_name: "can_shelf".to_string(),
        }
    }
}

impl Default for ManipulationConfig {
    fn default() -> Self {
        ManipulationConfig {
            reset_hold_secs: 2.0,
            profiles: manipulation::profile::default_profiles(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            check_interval_secs: 15,
            idle_sleep_ms: 500,
        }
    }
}

impl ShelfbotConfig {
    /// Loads a YAML configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShelfbotError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: ShelfbotConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects timing values that would stall the control loop: every hold and the
    /// poll interval must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ShelfbotError> {
        fn check(name: &str, value: f64) -> Result<(), ShelfbotError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ShelfbotError::Invalid(format!("{name} must be a finite, non-negative number, got {value}")))
            }
        }

        check("jobs.poll_interval_secs", self.jobs.poll_interval_secs)?;
        check("manipulation.reset_hold_secs", self.manipulation.reset_hold_secs)?;
        for (slot, profile) in &self.manipulation.profiles {
            for stage in &profile.lowering {
                check(&format!("slot {slot} {:?} hold", stage.joint), stage.hold)?;
            }
            check(&format!("slot {slot} release_hold"), profile.release_hold)?;
        }
        Ok(())
    }

    /// Loads `path` if it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ShelfbotError> {
        let path = path.as_ref();
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::load(path)
        } else {
            warn!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

/// Shelfbot error types
#[derive(Debug, Error)]
pub enum ShelfbotError {
    /// Configuration file could not be read
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
    /// Configuration values are out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Backend client could not be set up
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Snapshot of the controller for status queries
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    /// Active job id
    pub job_id: Option<String>,
    /// Whether a job is being executed
    pub job_in_progress: bool,
    /// Cursor into the active plan
    pub waypoint: usize,
    /// Length of the active plan
    pub plan_len: usize,
    /// Battery percentage
    pub battery: f64,
    /// Available slots on the pick shelf
    pub available_slots: Vec<u32>,
}

/// Primary entry point: owns the backend, the runtime state and the components.
pub struct Shelfbot<B: Backend> {
    backend: B,
    jobs: JobManager,
    interpreter: WaypointInterpreter,
    inventory: SlotInventory,
    state: RobotRuntimeState,
    poll_interval: f64,
    shelf_name: String,
}

impl<B: Backend> Shelfbot<B> {
    /// Create a controller with an empty inventory and an empty battery.
    pub fn new(config: &ShelfbotConfig, backend: B) -> Self {
        let sequencer = PickSequencer::new(config);
        Shelfbot {
            backend,
            jobs: JobManager::new(config),
            interpreter: WaypointInterpreter::new(&config.navigation, sequencer),
            inventory: SlotInventory::new(),
            state: RobotRuntimeState::new(0.0, 0.0),
            poll_interval: config.jobs.poll_interval_secs,
            shelf_name: config.jobs.shelf_name.clone(),
        }
    }

    /// Load shelves and the battery level from the backend and start the poll timer.
    /// Failures are logged; the controller still runs with what it has.
    pub fn initialize<R: Robot + ?Sized>(&mut self, robot: &R) {
        info!("Initializing Shelfbot {}...", self.jobs.robot_id());

        match self.backend.fetch_shelves() {
            Ok(shelves) => self.inventory.replace(shelves),
            Err(e) => error!("Error fetching shelves: {}", e),
        }

        match self.backend.fetch_battery_level(self.jobs.robot_id()) {
            Ok(level) => {
                self.state.set_battery(level);
                info!("Battery level initialized: {}%", level);
            }
            Err(e) => error!("Error fetching battery: {}", e),
        }

        self.state.mark_polled(robot.time());
        self.state.set_position(robot.position());
    }

    /// One control loop tick: poll for a job when idle and the interval has elapsed,
    /// then let the interpreter process at most one step.
    pub fn run_cycle<R: Robot + ?Sized>(&mut self, robot: &mut R) -> StepOutcome {
        let now = robot.time();
        if !self.state.job_in_progress() && now - self.state.last_poll() >= self.poll_interval {
            info!("{:.0}s elapsed - checking for assigned jobs", now - self.state.last_poll());
            self.state.set_position(robot.position());
            self.jobs.poll_for_job(&self.backend, &mut self.state);
            self.state.mark_polled(now);
        }

        self.interpreter.tick(
            robot,
            &self.backend,
            &self.jobs,
            &mut self.state,
            &mut self.inventory,
        )
    }

    /// Get current controller status
    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            job_id: self.state.job_id().map(str::to_string),
            job_in_progress: self.state.job_in_progress(),
            waypoint: self.state.cursor(),
            plan_len: self.state.plan().map_or(0, Plan::len),
            battery: self.state.battery(),
            available_slots: self.inventory.list_available(&self.shelf_name),
        }
    }

    /// Slot inventory, read-only.
    pub fn inventory(&self) -> &SlotInventory {
        &self.inventory
    }

    /// The backend handle.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
