// src/backend/http.rs
// Blocking JSON-over-HTTP client for the warehouse backend. Every call is a single
// request/response; callers decide what to do with failures.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Availability, Backend, BackendError, DispatchBackend, RobotLogEntry};
use crate::BackendConfig;
use crate::core::inventory::Shelf;
use crate::core::jobs::{Job, JobStatus};
use crate::dispatch::{Order, RobotRecord};

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    fn into_data(self) -> Result<Value, BackendError> {
        if self.success {
            if let Some(message) = &self.message {
                debug!("Backend: {}", message);
            }
            Ok(self.data)
        } else {
            Err(BackendError::Rejected {
                message: self.message.unwrap_or_else(|| "unsuccessful response".to_string()),
            })
        }
    }
}

/// True for `null`, `[]` and `{}`, which the backend uses for "nothing here".
fn is_empty(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, BackendError> {
    Ok(serde_json::from_value(data)?)
}

/// HTTP implementation of [`Backend`] and [`DispatchBackend`].
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    /// Builds a client for `config.base_url` with the configured request timeout.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(HttpBackend {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/warehouse/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> Result<Value, BackendError> {
        let envelope: Envelope = self.client.get(self.url(path)).send()?.json()?;
        envelope.into_data()
    }

    fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, BackendError> {
        let envelope: Envelope = self.client.patch(self.url(path)).json(body).send()?.json()?;
        envelope.into_data()
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, BackendError> {
        let envelope: Envelope = self.client.post(self.url(path)).json(body).send()?.json()?;
        envelope.into_data()
    }
}

impl Backend for HttpBackend {
    fn fetch_shelves(&self) -> Result<Vec<Shelf>, BackendError> {
        let data = self.get("get-shelves")?;
        if is_empty(&data) {
            return Ok(Vec::new());
        }
        decode(data)
    }

    fn fetch_battery_level(&self, robot_id: &str) -> Result<f64, BackendError> {
        let data = self.get(&format!("get-battery-level/{robot_id}"))?;
        data.as_f64()
            .ok_or_else(|| BackendError::Malformed(format!("battery level is not a number: {data}")))
    }

    fn fetch_assigned_job(&self, robot_id: &str) -> Result<Option<Job>, BackendError> {
        let data = self.get(&format!("get-assigned-job/{robot_id}"))?;
        if is_empty(&data) {
            return Ok(None);
        }
        decode(data).map(Some)
    }

    fn update_slot_availability(&self, shelf_name: &str, slot_id: u32, available: bool) -> Result<(), BackendError> {
        let body = json!({ "shelfName": shelf_name, "slotId": slot_id, "status": available });
        self.patch("update-slot-availability", &body).map(|_| ())
    }

    fn update_job_time(&self, job_id: &str, is_start_time: bool, time: DateTime<Utc>) -> Result<(), BackendError> {
        let body = json!({ "isStartTime": is_start_time, "time": time.to_rfc3339(), "jobId": job_id });
        self.patch("update-job-time", &body).map(|_| ())
    }

    fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<(), BackendError> {
        let body = json!({ "status": status, "jobId": job_id });
        self.patch("update-job-status", &body).map(|_| ())
    }

    fn update_robot_availability(&self, robot_id: &str, availability: Availability) -> Result<(), BackendError> {
        let body = json!({ "status": availability, "robotId": robot_id });
        self.patch("update-robot-availability", &body).map(|_| ())
    }

    fn update_battery_level(&self, robot_id: &str, level: f64) -> Result<(), BackendError> {
        let body = json!({ "batteryCount": level, "robotId": robot_id });
        self.patch("update-battery-level", &body).map(|_| ())
    }

    fn add_robot_log(&self, entry: &RobotLogEntry) -> Result<(), BackendError> {
        self.post("add-robot-log", entry).map(|_| ())
    }
}

impl DispatchBackend for HttpBackend {
    fn fetch_pending_orders(&self) -> Result<Vec<Order>, BackendError> {
        let data = self.get("get-pending-orders")?;
        if is_empty(&data) {
            return Ok(Vec::new());
        }
        decode(data)
    }

    fn fetch_available_robots(&self) -> Result<Vec<RobotRecord>, BackendError> {
        let data = self.get("get-available-robots")?;
        if is_empty(&data) {
            return Ok(Vec::new());
        }
        decode(data)
    }

    fn fetch_unassigned_jobs(&self) -> Result<Vec<Job>, BackendError> {
        let data = self.get("get-unassigned-jobs")?;
        if is_empty(&data) {
            return Ok(Vec::new());
        }
        decode(data)
    }

    fn create_job(&self, order: &Order) -> Result<String, BackendError> {
        let body = json!({ "orderId": order.id, "items": order.items });
        let data = self.post("create-job", &body)?;
        data.get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BackendError::Malformed(format!("created job has no id: {data}")))
    }

    fn assign_job(&self, job_id: &str, robot_id: &str) -> Result<(), BackendError> {
        let body = json!({ "jobId": job_id, "robotId": robot_id });
        self.patch("assign-job", &body).map(|_| ())
    }
}
