// Shared fixtures for integration tests: an in-memory backend that records every call,
// and helpers to run the controller against the kinematic robot.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Utc};
use shelfbot::backend::{Availability, Backend, BackendError, RobotLogEntry};
use shelfbot::core::{Job, JobItem, JobStatus, Shelf, Slot};
use shelfbot::navigation::{MoveDirection, RouteStep, TurnDirection};
use shelfbot::{Robot, Shelfbot, ShelfbotConfig, SimRobot, StepOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchJob,
    SlotUpdate { shelf: String, slot: u32, available: bool },
    JobTime { job_id: String, is_start: bool },
    JobStatus { job_id: String, status: JobStatus },
    Availability(Availability),
    Battery(f64),
    Log(String),
}

pub struct RecordingBackend {
    pub shelves: Vec<Shelf>,
    pub job: RefCell<Option<Job>>,
    pub battery: f64,
    pub fail_job_fetch: Cell<bool>,
    pub fail_slot_updates: Cell<bool>,
    pub calls: RefCell<Vec<Call>>,
}

impl RecordingBackend {
    /// Backend with `can_shelf` slots 1..=4, of which `available` are free.
    pub fn new(available: &[u32]) -> Self {
        RecordingBackend {
            shelves: vec![Shelf {
                name: "can_shelf".to_string(),
                slots: (1..=4)
                    .map(|id| Slot { id, available: available.contains(&id) })
                    .collect(),
            }],
            job: RefCell::new(None),
            battery: 100.0,
            fail_job_fetch: Cell::new(false),
            fail_slot_updates: Cell::new(false),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_job(self, id: &str, quantity: i64) -> Self {
        *self.job.borrow_mut() = Some(Job::new(id, vec![JobItem::new("Can", quantity)]));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Backend for RecordingBackend {
    fn fetch_shelves(&self) -> Result<Vec<Shelf>, BackendError> {
        Ok(self.shelves.clone())
    }

    fn fetch_battery_level(&self, _robot_id: &str) -> Result<f64, BackendError> {
        Ok(self.battery)
    }

    fn fetch_assigned_job(&self, _robot_id: &str) -> Result<Option<Job>, BackendError> {
        self.record(Call::FetchJob);
        if self.fail_job_fetch.get() {
            return Err(BackendError::Malformed("simulated timeout".to_string()));
        }
        Ok(self
            .job
            .borrow()
            .clone()
            .filter(|job| job.status != JobStatus::Completed))
    }

    fn update_slot_availability(&self, shelf_name: &str, slot_id: u32, available: bool) -> Result<(), BackendError> {
        self.record(Call::SlotUpdate { shelf: shelf_name.to_string(), slot: slot_id, available });
        if self.fail_slot_updates.get() {
            return Err(BackendError::Rejected { message: "slot update failed".to_string() });
        }
        Ok(())
    }

    fn update_job_time(&self, job_id: &str, is_start_time: bool, _time: DateTime<Utc>) -> Result<(), BackendError> {
        self.record(Call::JobTime { job_id: job_id.to_string(), is_start: is_start_time });
        Ok(())
    }

    fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<(), BackendError> {
        self.record(Call::JobStatus { job_id: job_id.to_string(), status });
        if let Some(job) = self.job.borrow_mut().as_mut() {
            job.status = status;
        }
        Ok(())
    }

    fn update_robot_availability(&self, _robot_id: &str, availability: Availability) -> Result<(), BackendError> {
        self.record(Call::Availability(availability));
        Ok(())
    }

    fn update_battery_level(&self, _robot_id: &str, level: f64) -> Result<(), BackendError> {
        self.record(Call::Battery(level));
        Ok(())
    }

    fn add_robot_log(&self, entry: &RobotLogEntry) -> Result<(), BackendError> {
        self.record(Call::Log(entry.message.clone()));
        Ok(())
    }
}

/// Short straight route the kinematic robot can drive: out along +x, a short turn,
/// square up, pick, then back to the origin.
pub fn test_route() -> Vec<RouteStep> {
    vec![
        RouteStep::Move { x: 1.0, y: 0.0, direction: MoveDirection::Forward },
        RouteStep::Turn { direction: TurnDirection::Left, duration: 0.5 },
        RouteStep::Rotate { axis: [0.0, 0.0, 1.0], angle: 0.0 },
        RouteStep::Pick,
        RouteStep::Move { x: 0.0, y: 0.0, direction: MoveDirection::Backward },
    ]
}

pub fn test_config() -> ShelfbotConfig {
    let mut config = ShelfbotConfig::default();
    config.jobs.poll_interval_secs = 1.0;
    config.route = test_route();
    config
}

pub fn controller(backend: RecordingBackend, robot: &SimRobot) -> Shelfbot<RecordingBackend> {
    let mut controller = Shelfbot::new(&test_config(), backend);
    controller.initialize(robot);
    controller
}

/// Ticks until `done` sees an outcome it accepts or `max_seconds` of simulation time
/// pass. Returns every outcome observed.
pub fn run_until(
    controller: &mut Shelfbot<RecordingBackend>,
    robot: &mut SimRobot,
    max_seconds: f64,
    done: impl Fn(&StepOutcome) -> bool,
) -> Vec<StepOutcome> {
    let mut outcomes = Vec::new();
    while robot.time() < max_seconds && robot.step() {
        let outcome = controller.run_cycle(robot);
        outcomes.push(outcome);
        if done(&outcome) {
            break;
        }
    }
    outcomes
}
