// core/state.rs

// Runtime state of the robot process: the active job and plan, the waypoint cursor,
// the rotation sub-state, battery level, the job-in-progress gate and the last sensed
// position. One instance lives in the orchestrator and is only touched from the tick loop.

use log::info;
use nalgebra::Vector2;

use super::jobs::Job;
use crate::navigation::{Plan, TurnDirection};

/// Sub-state of a timed turn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RotationState {
    /// No timed turn running
    Idle,
    /// Turning in `direction` since `start_time` (sim seconds) for `duration` seconds
    Rotating {
        /// Fixed for the whole step
        direction: TurnDirection,
        /// Simulation time the turn began
        start_time: f64,
        /// Requested duration in seconds
        duration: f64,
    },
}

/// Everything the tick loop mutates.
#[derive(Debug)]
pub struct RobotRuntimeState {
    job: Option<Job>,
    plan: Option<Plan>,
    cursor: usize,
    rotation: RotationState,
    battery: f64,
    job_in_progress: bool,
    position: Vector2<f64>,
    last_poll: f64,
}

impl RobotRuntimeState {
    /// Idle state with the given battery level and poll timer origin.
    pub fn new(battery: f64, now: f64) -> Self {
        RobotRuntimeState {
            job: None,
            plan: None,
            cursor: 0,
            rotation: RotationState::Idle,
            battery,
            job_in_progress: false,
            position: Vector2::zeros(),
            last_poll: now,
        }
    }

    /// Installs a job and its plan and raises the in-progress gate.
    pub fn begin_job(&mut self, job: Job, plan: Plan) {
        info!("Job {} in progress with {} waypoints", job.id, plan.len());
        self.job = Some(job);
        self.plan = Some(plan);
        self.cursor = 0;
        self.rotation = RotationState::Idle;
        self.job_in_progress = true;
    }

    /// Clears the plan, resets the cursor and lowers the in-progress gate.
    /// Returns the job that was active.
    pub fn finish_job(&mut self) -> Option<Job> {
        self.plan = None;
        self.cursor = 0;
        self.rotation = RotationState::Idle;
        self.job_in_progress = false;
        self.job.take()
    }

    /// True while a job is being executed.
    pub fn job_in_progress(&self) -> bool {
        self.job_in_progress
    }

    /// The active job.
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Id of the active job.
    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|job| job.id.as_str())
    }

    /// The active plan.
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Index of the next waypoint to process.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves to the next waypoint.
    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
    }

    /// Timed-turn sub-state.
    pub fn rotation(&self) -> RotationState {
        self.rotation
    }

    /// Replaces the timed-turn sub-state.
    pub fn set_rotation(&mut self, rotation: RotationState) {
        self.rotation = rotation;
    }

    /// Battery level in percent.
    pub fn battery(&self) -> f64 {
        self.battery
    }

    /// Overwrites the battery level (e.g. after a charge or a backend sync).
    pub fn set_battery(&mut self, level: f64) {
        self.battery = level.clamp(0.0, 100.0);
    }

    /// Lowers the battery by `amount`, never below zero, and returns the new level.
    pub fn drain_battery(&mut self, amount: f64) -> f64 {
        self.battery = (self.battery - amount.max(0.0)).max(0.0);
        self.battery
    }

    /// Last sensed position.
    pub fn position(&self) -> Vector2<f64> {
        self.position
    }

    /// Records a position sensor reading.
    pub fn set_position(&mut self, position: Vector2<f64>) {
        self.position = position;
    }

    /// Simulation time of the last poll attempt.
    pub fn last_poll(&self) -> f64 {
        self.last_poll
    }

    /// Restarts the poll interval timer.
    pub fn mark_polled(&mut self, now: f64) {
        self.last_poll = now;
    }
}
