//! Timer, history and snapshot records

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version written into every snapshot. Loads must match it exactly.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Paused,
    Running,
    Completed,
}

/// Fixed set of categories a timer can be filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimerCategory {
    Work,
    Study,
    Exercise,
    Cooking,
    Personal,
    #[default]
    Other,
}

impl TimerCategory {
    pub const ALL: [TimerCategory; 6] = [
        TimerCategory::Work,
        TimerCategory::Study,
        TimerCategory::Exercise,
        TimerCategory::Cooking,
        TimerCategory::Personal,
        TimerCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerCategory::Work => "Work",
            TimerCategory::Study => "Study",
            TimerCategory::Exercise => "Exercise",
            TimerCategory::Cooking => "Cooking",
            TimerCategory::Personal => "Personal",
            TimerCategory::Other => "Other",
        }
    }
}

impl fmt::Display for TimerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// A single countdown.
///
/// `remaining_time == 0` exactly when the status is `Completed`, and
/// `last_started` (epoch milliseconds) is present exactly while `Running`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: String,
    pub name: String,
    pub category: TimerCategory,
    /// Total length in seconds
    pub duration: u64,
    /// Seconds left, within `0..=duration`
    pub remaining_time: u64,
    pub status: TimerStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started: Option<i64>,
    #[serde(default)]
    pub halfway_alert: bool,
}

impl Timer {
    /// Create a paused timer with the full duration remaining
    pub fn new(name: &str, category: TimerCategory, duration: u64, halfway_alert: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            category,
            duration,
            remaining_time: duration,
            status: TimerStatus::Paused,
            created_at: Utc::now(),
            last_started: None,
            halfway_alert,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    /// Remaining seconds if the timer were sampled at `now_ms`
    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        match (self.status, self.last_started) {
            (TimerStatus::Running, Some(started)) => self
                .remaining_time
                .saturating_sub(elapsed_seconds(started, now_ms)),
            _ => self.remaining_time,
        }
    }

    pub(crate) fn start(&mut self, now_ms: i64) {
        if self.is_completed() {
            return;
        }
        self.status = TimerStatus::Running;
        self.last_started = Some(now_ms);
    }

    pub(crate) fn pause(&mut self, now_ms: i64) {
        if !self.is_running() {
            return;
        }
        self.remaining_time = self.remaining_at(now_ms);
        self.status = TimerStatus::Paused;
        self.last_started = None;
    }

    pub(crate) fn reset(&mut self) {
        self.remaining_time = self.duration;
        self.status = TimerStatus::Paused;
        self.last_started = None;
    }

    pub(crate) fn complete(&mut self) {
        self.remaining_time = 0;
        self.status = TimerStatus::Completed;
        self.last_started = None;
    }
}

/// Whole seconds between two epoch-millisecond instants, truncated.
///
/// Truncation under-counts fractional seconds so a timer never completes early.
/// A clock that moved backwards counts as zero.
pub fn elapsed_seconds(since_ms: i64, now_ms: i64) -> u64 {
    u64::try_from(now_ms.saturating_sub(since_ms)).unwrap_or(0) / 1000
}

/// Immutable record of one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timer_id: String,
    pub timer_name: String,
    pub category: TimerCategory,
    pub duration: u64,
    pub completed_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn for_timer(timer: &Timer, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timer_id: timer.id.clone(),
            timer_name: timer.name.clone(),
            category: timer.category,
            duration: timer.duration,
            completed_at,
        }
    }
}

/// Serialized projection of the whole store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timers: Vec<Timer>,
    pub history: Vec<HistoryEntry>,
    pub version: String,
}

impl Snapshot {
    pub fn any_running(&self) -> bool {
        self.timers.iter().any(Timer::is_running)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            history: Vec::new(),
            version: SCHEMA_VERSION.to_string(),
        }
    }
}
