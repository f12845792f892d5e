//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    state::{Category, Timer},
    utils::duration,
};

/// A timer as returned by the API, with its remaining time ready to display
#[derive(Debug, Clone, Serialize)]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    pub display: String,
}

impl TimerView {
    pub fn new(timer: Timer, now: DateTime<Utc>) -> Self {
        let display = duration::format(timer.remaining_at(now.timestamp_millis()));
        Self { timer, display }
    }
}

/// A category group as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub timers: Vec<TimerView>,
}

impl CategoryView {
    pub fn new(category: Category, now: DateTime<Utc>) -> Self {
        Self {
            name: category.name.to_string(),
            timers: category
                .timers
                .into_iter()
                .map(|timer| TimerView::new(timer, now))
                .collect(),
        }
    }
}

/// Response for bulk category actions
#[derive(Debug, Clone, Serialize)]
pub struct CategoryActionResponse {
    pub category: String,
    pub action: String,
    pub affected: usize,
    pub timestamp: DateTime<Utc>,
}

/// Status response with store and reconciler information
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub running: usize,
    pub completed: usize,
    pub history_entries: usize,
    pub reconciler_active: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Error body for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
