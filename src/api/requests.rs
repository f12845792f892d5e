//! API request bodies and their validation

use serde::Deserialize;
use thiserror::Error;

use crate::{
    state::{Timer, TimerCategory},
    utils::duration,
};

/// Input rejected before it reaches the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a timer name")]
    EmptyName,

    #[error("Please enter a valid duration")]
    InvalidDuration,
}

/// Body of POST /timers
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimerRequest {
    pub name: String,
    #[serde(default)]
    pub category: TimerCategory,
    /// Raw seconds, `M:SS` or `H:MM:SS`
    pub duration: String,
    #[serde(default)]
    pub halfway_alert: bool,
}

impl CreateTimerRequest {
    pub fn into_timer(self) -> Result<Timer, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let seconds = duration::parse(&self.duration);
        if seconds == 0 {
            return Err(ValidationError::InvalidDuration);
        }
        Ok(Timer::new(&self.name, self.category, seconds, self.halfway_alert))
    }
}

/// Body of PATCH /timers/:id; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimerRequest {
    pub name: Option<String>,
    pub category: Option<TimerCategory>,
    pub halfway_alert: Option<bool>,
}

impl UpdateTimerRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.name {
            Some(name) if name.trim().is_empty() => Err(ValidationError::EmptyName),
            _ => Ok(()),
        }
    }

    /// The full replacement record for `timer`
    pub fn apply(&self, timer: &Timer) -> Timer {
        let mut updated = timer.clone();
        if let Some(name) = &self.name {
            updated.name = name.trim().to_string();
        }
        if let Some(category) = self.category {
            updated.category = category;
        }
        if let Some(halfway_alert) = self.halfway_alert {
            updated.halfway_alert = halfway_alert;
        }
        updated
    }
}
