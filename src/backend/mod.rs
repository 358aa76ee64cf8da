//! Backend interface for Shelfbot
//!
//! This module describes everything the robot and the supervisor consume from the
//! warehouse backend:
//! - Job, slot, battery and availability records
//! - The robot activity log
//! - Pending orders and idle robots for dispatching
//!
//! Every endpoint answers with the same `{success, data, message}` envelope. A
//! non-success envelope and a transport failure are both plain errors to callers.

mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpBackend;

use crate::core::inventory::Shelf;
use crate::core::jobs::{Job, JobStatus};
use crate::dispatch::{Order, RobotRecord};

/// Backend call errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// Timeout, connection failure, or an undecodable response body
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend answered with `success: false`
    #[error("request rejected: {message}")]
    Rejected {
        /// Message returned by the backend, if any
        message: String,
    },
    /// The envelope decoded but its data had an unexpected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

/// Robot availability as recorded by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Free to take a job
    Idle,
}

/// Status tag attached to robot log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotActivity {
    /// Executing a job
    Working,
    /// Between jobs
    Free,
}

/// Position on the wire, rounded to centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogPosition {
    /// x coordinate
    pub x: f64,
    /// y coordinate
    pub y: f64,
}

impl LogPosition {
    /// Rounds both coordinates to two decimals.
    pub fn rounded(x: f64, y: f64) -> Self {
        LogPosition {
            x: (x * 100.0).round() / 100.0,
            y: (y * 100.0).round() / 100.0,
        }
    }
}

/// One entry of the robot activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotLogEntry {
    /// Robot identity
    pub robot_id: String,
    /// Job the entry belongs to, if any
    pub job_id: Option<String>,
    /// Battery level at the time of the entry
    pub battery_percentage: f64,
    /// Status tag
    pub status: RobotActivity,
    /// Sensed position
    pub position: LogPosition,
    /// Free-text message
    pub message: String,
}

/// Calls the robot controller makes against the backend.
#[cfg_attr(test, mockall::automock)]
pub trait Backend {
    /// All shelves with their slots.
    fn fetch_shelves(&self) -> Result<Vec<Shelf>, BackendError>;

    /// Stored battery level of `robot_id`.
    fn fetch_battery_level(&self, robot_id: &str) -> Result<f64, BackendError>;

    /// Job currently assigned to `robot_id`, if there is one.
    fn fetch_assigned_job(&self, robot_id: &str) -> Result<Option<Job>, BackendError>;

    /// Set the availability of one slot.
    fn update_slot_availability(&self, shelf_name: &str, slot_id: u32, available: bool) -> Result<(), BackendError>;

    /// Record the start (`is_start_time`) or end time of a job.
    fn update_job_time(&self, job_id: &str, is_start_time: bool, time: DateTime<Utc>) -> Result<(), BackendError>;

    /// Set the lifecycle status of a job.
    fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<(), BackendError>;

    /// Set the availability of a robot.
    fn update_robot_availability(&self, robot_id: &str, availability: Availability) -> Result<(), BackendError>;

    /// Report the battery level of a robot.
    fn update_battery_level(&self, robot_id: &str, level: f64) -> Result<(), BackendError>;

    /// Append an entry to the robot activity log.
    fn add_robot_log(&self, entry: &RobotLogEntry) -> Result<(), BackendError>;
}

/// Calls the supervisor makes against the backend.
pub trait DispatchBackend {
    /// Orders that have no job yet.
    fn fetch_pending_orders(&self) -> Result<Vec<Order>, BackendError>;

    /// Robots that are idle.
    fn fetch_available_robots(&self) -> Result<Vec<RobotRecord>, BackendError>;

    /// Jobs that are not assigned to any robot.
    fn fetch_unassigned_jobs(&self) -> Result<Vec<Job>, BackendError>;

    /// Create a job for an order and return its id.
    fn create_job(&self, order: &Order) -> Result<String, BackendError>;

    /// Assign a job to a robot.
    fn assign_job(&self, job_id: &str, robot_id: &str) -> Result<(), BackendError>;
}
