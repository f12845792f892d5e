//! In-memory timer store and its state transitions
//!
//! Every operation is synchronous and takes the current instant as an
//! argument instead of reading a clock. Operations that reference an unknown
//! timer id leave the store untouched and report `false`.

use thiserror::Error;
use tracing::debug;

use super::timer::{HistoryEntry, Snapshot, Timer, TimerCategory, SCHEMA_VERSION};

/// Reasons a snapshot is refused by [`TimerStore::load_snapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("snapshot version {found} does not match schema version {expected}")]
    VersionMismatch { found: String, expected: String },
}

/// Authoritative collection of timers and completed-run history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerStore {
    timers: Vec<Timer>,
    /// Most recent first
    history: Vec<HistoryEntry>,
}

impl TimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn get(&self, id: &str) -> Option<&Timer> {
        self.timers.iter().find(|timer| timer.id == id)
    }

    pub fn running_count(&self) -> usize {
        self.timers.iter().filter(|timer| timer.is_running()).count()
    }

    pub fn any_running(&self) -> bool {
        self.timers.iter().any(Timer::is_running)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|timer| timer.id == id)
    }

    /// Append a validated timer
    pub fn create(&mut self, timer: Timer) {
        debug_assert!(!timer.name.is_empty() && timer.duration > 0);
        debug!("Creating timer {} ({})", timer.id, timer.name);
        self.timers.push(timer);
    }

    /// Replace the stored record that shares `timer.id`
    pub fn update(&mut self, timer: Timer) -> bool {
        match self.get_mut(&timer.id) {
            Some(existing) => {
                *existing = timer;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    /// Move a non-completed timer into `Running`, baselined at `now_ms`
    pub fn start(&mut self, id: &str, now_ms: i64) -> bool {
        match self.get_mut(id) {
            Some(timer) if !timer.is_completed() => {
                timer.start(now_ms);
                true
            }
            _ => false,
        }
    }

    /// Fold the elapsed run time into `remaining_time` and pause
    pub fn pause(&mut self, id: &str, now_ms: i64) -> bool {
        match self.get_mut(id) {
            Some(timer) if timer.is_running() => {
                timer.pause(now_ms);
                true
            }
            _ => false,
        }
    }

    /// Restore the full duration from any status
    pub fn reset(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(timer) => {
                timer.reset();
                true
            }
            None => false,
        }
    }

    pub fn complete(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(timer) => {
                timer.complete();
                true
            }
            None => false,
        }
    }

    /// Start every non-completed timer in the category
    pub fn start_category(&mut self, category: TimerCategory, now_ms: i64) -> usize {
        let mut affected = 0;
        for timer in self.in_category(category).filter(|timer| !timer.is_completed()) {
            timer.start(now_ms);
            affected += 1;
        }
        affected
    }

    /// Pause every running timer in the category
    pub fn pause_category(&mut self, category: TimerCategory, now_ms: i64) -> usize {
        let mut affected = 0;
        for timer in self.in_category(category).filter(|timer| timer.is_running()) {
            timer.pause(now_ms);
            affected += 1;
        }
        affected
    }

    /// Reset every timer in the category
    pub fn reset_category(&mut self, category: TimerCategory) -> usize {
        let mut affected = 0;
        for timer in self.in_category(category) {
            timer.reset();
            affected += 1;
        }
        affected
    }

    fn in_category(&mut self, category: TimerCategory) -> impl Iterator<Item = &mut Timer> + '_ {
        self.timers
            .iter_mut()
            .filter(move |timer| timer.category == category)
    }

    pub fn add_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
    }

    /// Replace the whole store with a persisted snapshot of the current schema
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> Result<(), LoadError> {
        if snapshot.version != SCHEMA_VERSION {
            return Err(LoadError::VersionMismatch {
                found: snapshot.version,
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        self.timers = snapshot.timers;
        self.history = snapshot.history;
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            timers: self.timers.clone(),
            history: self.history.clone(),
            version: SCHEMA_VERSION.to_string(),
        }
    }
}
