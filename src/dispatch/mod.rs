//! Supervisor service for Shelfbot
//!
//! Runs beside the robot processes and shares nothing with them except the backend.
//! On its own cadence it fetches pending orders and idle robots, turns orders into
//! jobs and assigns jobs to robots. How jobs are formed and matched is left to a
//! [`Dispatcher`].

use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::SupervisorConfig;
use crate::backend::{BackendError, DispatchBackend};
use crate::core::JobItem;

/// A customer order waiting to become a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Backend identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Ordered items
    #[serde(default)]
    pub items: Vec<JobItem>,
}

/// A robot the backend reports as available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotRecord {
    /// Robot name, the identity the robot polls with
    pub name: String,
    /// Battery level, when reported
    #[serde(default, rename = "batteryLevel")]
    pub battery_level: Option<f64>,
}

/// Turns orders into jobs and jobs into assignments.
pub trait Dispatcher {
    /// Create jobs for pending orders. Returns how many jobs were created.
    fn dispatch_orders<B: DispatchBackend + ?Sized>(&self, backend: &B, orders: &[Order]) -> usize;

    /// Assign open jobs to available robots. Returns how many were assigned.
    fn assign_jobs<B: DispatchBackend + ?Sized>(&self, backend: &B, robots: &[RobotRecord]) -> usize;
}

/// One job per order; open jobs go to available robots in the order both are listed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoDispatcher;

impl Dispatcher for FifoDispatcher {
    fn dispatch_orders<B: DispatchBackend + ?Sized>(&self, backend: &B, orders: &[Order]) -> usize {
        let mut created = 0;
        for order in orders {
            match backend.create_job(order) {
                Ok(job_id) => {
                    info!("Order {} dispatched as job {}", order.id, job_id);
                    created += 1;
                }
                Err(e) => error!("Failed to create job for order {}: {}", order.id, e),
            }
        }
        created
    }

    fn assign_jobs<B: DispatchBackend + ?Sized>(&self, backend: &B, robots: &[RobotRecord]) -> usize {
        let jobs = match backend.fetch_unassigned_jobs() {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to fetch unassigned jobs: {}", e);
                return 0;
            }
        };

        let mut assigned = 0;
        for (job, robot) in jobs.iter().zip(robots) {
            match backend.assign_job(&job.id, &robot.name) {
                Ok(()) => {
                    info!("Job {} assigned to {}", job.id, robot.name);
                    assigned += 1;
                }
                Err(e) => error!("Failed to assign job {} to {}: {}", job.id, robot.name, e),
            }
        }
        assigned
    }
}

/// Result of one supervisor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Pending orders seen
    pub orders: usize,
    /// Available robots seen
    pub robots: usize,
    /// Jobs created
    pub jobs_created: usize,
    /// Jobs assigned
    pub jobs_assigned: usize,
}

/// Polling loop around a [`Dispatcher`].
pub struct Supervisor<B, D> {
    backend: B,
    dispatcher: D,
    check_interval: Duration,
    idle_sleep: Duration,
}

impl<B: DispatchBackend, D: Dispatcher> Supervisor<B, D> {
    /// Create a supervisor with the configured cadence.
    pub fn new(config: &SupervisorConfig, backend: B, dispatcher: D) -> Self {
        Supervisor {
            backend,
            dispatcher,
            check_interval: Duration::from_secs(config.check_interval_secs),
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
        }
    }

    /// Fetch orders and robots, then dispatch and assign. Nothing is dispatched unless
    /// both fetches succeed.
    pub fn run_cycle(&self) -> Result<CycleReport, BackendError> {
        info!("Fetching orders and robots...");
        let robots = self.backend.fetch_available_robots();
        let orders = self.backend.fetch_pending_orders();
        let (robots, orders) = (robots?, orders?);
        info!("Found {} pending orders and {} available robots", orders.len(), robots.len());

        let mut report = CycleReport {
            orders: orders.len(),
            robots: robots.len(),
            ..CycleReport::default()
        };
        if !orders.is_empty() {
            info!("Dispatching {} orders...", orders.len());
            report.jobs_created = self.dispatcher.dispatch_orders(&self.backend, &orders);
        }
        if !robots.is_empty() {
            report.jobs_assigned = self.dispatcher.assign_jobs(&self.backend, &robots);
        }
        Ok(report)
    }

    /// Run cycles every check interval until `keep_running` returns false.
    pub fn run(&self, mut keep_running: impl FnMut() -> bool) {
        info!("Supervisor service started; checking orders every {:?}", self.check_interval);
        let mut last_check = Instant::now();
        while keep_running() {
            if last_check.elapsed() >= self.check_interval {
                if let Err(e) = self.run_cycle() {
                    match e {
                        BackendError::Transport(ref t) if t.is_timeout() => {
                            warn!("Request timeout - API not responding")
                        }
                        BackendError::Transport(ref t) if t.is_connect() => {
                            warn!("Connection error - is the server running?")
                        }
                        other => error!("Error processing orders/robots: {}", other),
                    }
                }
                last_check = Instant::now();
            }
            std::thread::sleep(self.idle_sleep);
        }
        info!("Supervisor service shut down");
    }
}
