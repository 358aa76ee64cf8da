// core/jobs.rs

// Job lifecycle: polls the backend for a job assigned to this robot, turns it into a
// plan, and reports start and completion back. Every remote call here is best effort;
// a failed call is logged and never stops the calls that follow it.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::state::RobotRuntimeState;
use crate::backend::{Availability, Backend, LogPosition, RobotActivity, RobotLogEntry};
use crate::navigation::planner::RoutePlanner;
use crate::ShelfbotConfig;

/// Lifecycle status of a job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up by a robot
    #[default]
    Unassigned,
    /// Being executed
    InProgress,
    /// Finished
    Completed,
    /// Any status this controller does not act on
    #[serde(other)]
    Other,
}

/// One line of a job: an item name and how many to fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    /// Item name, e.g. `Can`
    pub name: String,
    /// Requested count
    pub quantity: i64,
}

impl JobItem {
    /// Creates a job line.
    pub fn new(name: impl Into<String>, quantity: i64) -> Self {
        JobItem { name: name.into(), quantity }
    }
}

/// A unit of work issued by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Backend identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Requested items
    #[serde(default)]
    pub items: Vec<JobItem>,
    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,
    /// When this robot started the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When this robot finished the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    /// New unassigned job.
    pub fn new(id: impl Into<String>, items: Vec<JobItem>) -> Self {
        Job {
            id: id.into(),
            items,
            status: JobStatus::Unassigned,
            started_at: None,
            ended_at: None,
        }
    }

    /// Total requested quantity when every line asks for `item_name`. `None` for an
    /// empty job or one that also asks for anything else.
    pub fn quantity_of(&self, item_name: &str) -> Option<i64> {
        if self.items.is_empty() || self.items.iter().any(|item| item.name != item_name) {
            return None;
        }
        Some(self.items.iter().map(|item| item.quantity).sum())
    }
}

/// Polls for jobs and reports their outcome.
pub struct JobManager {
    robot_id: String,
    item_name: String,
    battery_drain: f64,
    planner: RoutePlanner,
}

impl JobManager {
    /// Creates a manager for the configured robot identity, item and route.
    pub fn new(config: &ShelfbotConfig) -> Self {
        JobManager {
            robot_id: config.robot.name.clone(),
            item_name: config.jobs.item_name.clone(),
            battery_drain: config.robot.battery_drain_per_job,
            planner: RoutePlanner::new(config.route.clone()),
        }
    }

    /// Robot identity used against the backend.
    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    /// Name of the item this robot fetches.
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    /// Asks the backend for a job assigned to this robot. On success the job is
    /// started: the plan is built for its quantity, the in-progress gate is raised and
    /// the start is reported. Any failure leaves `state` untouched.
    pub fn poll_for_job<B: Backend + ?Sized>(&self, backend: &B, state: &mut RobotRuntimeState) -> Option<Job> {
        if state.job_in_progress() {
            warn!("Job poll skipped: job {:?} still in progress", state.job_id());
            return None;
        }

        let mut job = match backend.fetch_assigned_job(&self.robot_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!("No jobs assigned yet");
                return None;
            }
            Err(e) => {
                error!("Error checking allocated job: {}", e);
                return None;
            }
        };

        let Some(quantity) = job.quantity_of(&self.item_name) else {
            warn!("Job {} does not ask for {} alone; ignoring it", job.id, self.item_name);
            return None;
        };
        info!("Job {} assigned: {} x {}", job.id, quantity, self.item_name);

        let started_at = Utc::now();
        job.started_at = Some(started_at);
        job.status = JobStatus::InProgress;
        let plan = self.planner.build(quantity);
        state.begin_job(job.clone(), plan);

        self.log_activity(
            backend,
            state,
            RobotActivity::Working,
            &format!("Starting Job to Pick {} {}s", quantity, self.item_name),
        );
        if let Err(e) = backend.update_job_time(&job.id, true, started_at) {
            error!("Error updating job start time: {}", e);
        }

        Some(job)
    }

    /// Reports a finished job: end time, completion log entry, job status, robot
    /// availability and the drained battery level. Each call is attempted regardless of
    /// how the previous one went.
    pub fn report_completion<B: Backend + ?Sized>(
        &self,
        backend: &B,
        state: &mut RobotRuntimeState,
        job: &mut Job,
        final_position: Vector2<f64>,
    ) {
        let ended_at = Utc::now();
        job.ended_at = Some(ended_at);
        info!("Reporting completion of job {}", job.id);

        if let Err(e) = backend.update_job_time(&job.id, false, ended_at) {
            error!("Error updating job end time: {}", e);
        }

        let entry = RobotLogEntry {
            robot_id: self.robot_id.clone(),
            job_id: Some(job.id.clone()),
            battery_percentage: state.battery(),
            status: RobotActivity::Free,
            position: LogPosition::rounded(final_position.x, final_position.y),
            message: "Completed job!".to_string(),
        };
        if let Err(e) = backend.add_robot_log(&entry) {
            error!("Error adding robot log: {}", e);
        }

        match backend.update_job_status(&job.id, JobStatus::Completed) {
            Ok(()) => {
                job.status = JobStatus::Completed;
                info!("Job {} completed", job.id);
            }
            Err(e) => error!("Error updating job status: {}", e),
        }

        if let Err(e) = backend.update_robot_availability(&self.robot_id, Availability::Idle) {
            error!("Error updating robot availability: {}", e);
        }

        let level = state.drain_battery(self.battery_drain);
        match backend.update_battery_level(&self.robot_id, level) {
            Ok(()) => info!("Battery updated: {}%", level),
            Err(e) => error!("Error updating battery level: {}", e),
        }
    }

    /// Appends an activity entry for the current job at the last sensed position.
    pub fn log_activity<B: Backend + ?Sized>(
        &self,
        backend: &B,
        state: &RobotRuntimeState,
        status: RobotActivity,
        message: &str,
    ) {
        let position = state.position();
        let entry = RobotLogEntry {
            robot_id: self.robot_id.clone(),
            job_id: state.job_id().map(str::to_string),
            battery_percentage: state.battery(),
            status,
            position: LogPosition::rounded(position.x, position.y),
            message: message.to_string(),
        };
        if let Err(e) = backend.add_robot_log(&entry) {
            warn!("Error adding robot log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockBackend};
    use crate::navigation::WaypointStep;
    use rstest::rstest;

    fn manager() -> JobManager {
        JobManager::new(&ShelfbotConfig::default())
    }

    fn timeout() -> BackendError {
        BackendError::Malformed("simulated timeout".to_string())
    }

    #[rstest]
    #[case(vec![JobItem::new("Can", 2)], Some(2))]
    #[case(vec![JobItem::new("Can", 2), JobItem::new("Can", 1)], Some(3))]
    #[case(vec![JobItem::new("Cereal", 2)], None)]
    #[case(vec![JobItem::new("Can", 1), JobItem::new("Cereal", 3)], None)]
    #[case(vec![], None)]
    fn quantity_of_item(#[case] items: Vec<JobItem>, #[case] expected: Option<i64>) {
        assert_eq!(Job::new("j", items).quantity_of("Can"), expected);
    }

    #[test]
    fn poll_starts_job_and_builds_plan() {
        let mut backend = MockBackend::new();
        backend
            .expect_fetch_assigned_job()
            .times(1)
            .returning(|_| Ok(Some(Job::new("job-1", vec![JobItem::new("Can", 2)]))));
        backend.expect_add_robot_log().times(1).returning(|_| Ok(()));
        backend
            .expect_update_job_time()
            .withf(|job_id, is_start, _| job_id == "job-1" && *is_start)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut state = RobotRuntimeState::new(100.0, 0.0);
        let job = manager().poll_for_job(&backend, &mut state).unwrap();

        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.started_at.is_some());
        assert!(state.job_in_progress());
        let picks: Vec<_> = state
            .plan()
            .unwrap()
            .steps()
            .iter()
            .filter_map(|step| match step {
                WaypointStep::PickBatch { quantity } => Some(*quantity),
                _ => None,
            })
            .collect();
        assert_eq!(picks, vec![2]);
    }

    #[test]
    fn poll_failure_leaves_state_untouched() {
        let mut backend = MockBackend::new();
        backend.expect_fetch_assigned_job().times(1).returning(|_| Err(timeout()));
        backend.expect_add_robot_log().never();
        backend.expect_update_job_time().never();

        let mut state = RobotRuntimeState::new(100.0, 0.0);
        assert!(manager().poll_for_job(&backend, &mut state).is_none());
        assert!(!state.job_in_progress());
        assert!(state.plan().is_none());
    }

    #[test]
    fn poll_ignores_jobs_without_the_item() {
        let mut backend = MockBackend::new();
        backend
            .expect_fetch_assigned_job()
            .returning(|_| Ok(Some(Job::new("job-2", vec![JobItem::new("Cereal", 1)]))));

        let mut state = RobotRuntimeState::new(100.0, 0.0);
        assert!(manager().poll_for_job(&backend, &mut state).is_none());
        assert!(!state.job_in_progress());
    }

    #[test]
    fn poll_ignores_mixed_item_jobs() {
        let mut backend = MockBackend::new();
        backend.expect_fetch_assigned_job().times(1).returning(|_| {
            Ok(Some(Job::new(
                "job-5",
                vec![JobItem::new("Can", 1), JobItem::new("Cereal", 3)],
            )))
        });
        backend.expect_add_robot_log().never();
        backend.expect_update_job_time().never();

        let mut state = RobotRuntimeState::new(100.0, 0.0);
        assert!(manager().poll_for_job(&backend, &mut state).is_none());
        assert!(!state.job_in_progress());
        assert!(state.plan().is_none());
        assert_eq!(state.job_id(), None);
    }

    #[test]
    fn poll_never_starts_a_second_job() {
        let mut backend = MockBackend::new();
        backend
            .expect_fetch_assigned_job()
            .times(1)
            .returning(|_| Ok(Some(Job::new("job-1", vec![JobItem::new("Can", 1)]))));
        backend.expect_add_robot_log().returning(|_| Ok(()));
        backend.expect_update_job_time().returning(|_, _, _| Ok(()));

        let manager = manager();
        let mut state = RobotRuntimeState::new(100.0, 0.0);
        assert!(manager.poll_for_job(&backend, &mut state).is_some());
        for _ in 0..5 {
            assert!(manager.poll_for_job(&backend, &mut state).is_none());
        }
        assert_eq!(state.job_id(), Some("job-1"));
    }

    #[test]
    fn completion_attempts_every_call_even_when_all_fail() {
        let mut backend = MockBackend::new();
        backend.expect_update_job_time().times(1).returning(|_, _, _| Err(timeout()));
        backend.expect_add_robot_log().times(1).returning(|_| Err(timeout()));
        backend.expect_update_job_status().times(1).returning(|_, _| Err(timeout()));
        backend.expect_update_robot_availability().times(1).returning(|_, _| Err(timeout()));
        backend.expect_update_battery_level().times(1).returning(|_, _| Err(timeout()));

        let mut state = RobotRuntimeState::new(90.0, 0.0);
        let mut job = Job::new("job-3", vec![JobItem::new("Can", 1)]);
        manager().report_completion(&backend, &mut state, &mut job, Vector2::new(3.02, -3.06));

        assert!(job.ended_at.is_some());
        assert_eq!(job.status, JobStatus::Unassigned);
        assert_eq!(state.battery(), 85.0);
    }

    #[test]
    fn completion_reports_post_drain_battery_level() {
        let mut backend = MockBackend::new();
        backend.expect_update_job_time().returning(|_, _, _| Ok(()));
        backend
            .expect_add_robot_log()
            .withf(|entry| entry.status == RobotActivity::Free && entry.message == "Completed job!")
            .returning(|_| Ok(()));
        backend
            .expect_update_job_status()
            .withf(|job_id, status| job_id == "job-4" && *status == JobStatus::Completed)
            .returning(|_, _| Ok(()));
        backend
            .expect_update_robot_availability()
            .withf(|robot, availability| robot == "youbot" && *availability == Availability::Idle)
            .returning(|_, _| Ok(()));
        backend
            .expect_update_battery_level()
            .withf(|_, level| *level == 75.0)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut state = RobotRuntimeState::new(80.0, 0.0);
        let mut job = Job::new("job-4", vec![JobItem::new("Can", 1)]);
        manager().report_completion(&backend, &mut state, &mut job, Vector2::zeros());
        assert_eq!(job.status, JobStatus::Completed);
    }
}
