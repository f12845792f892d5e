//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::{
    notices::{Notice, NoticeLevel, Notices},
    store::{LoadError, TimerStore},
    timer::Snapshot,
};
use crate::services::notifier::{LogNotifier, Notification, Notifier};

/// Shared state container owning the timer store.
///
/// Every mutation goes through [`AppState::update_store`], which applies it
/// under a single lock and then broadcasts the resulting snapshot to
/// observers (the tick reconciler and the persistence writer).
#[derive(Debug)]
pub struct AppState {
    store: Arc<Mutex<TimerStore>>,
    notices: Arc<Mutex<Notices>>,
    notifier: Arc<dyn Notifier>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Channel for store change notifications
    pub state_change_tx: broadcast::Sender<Snapshot>,
    /// Whether the tick cadence is currently active
    pub reconciler_active_tx: watch::Sender<bool>,
    /// Keep the receiver alive to prevent channel closure
    pub _reconciler_active_rx: watch::Receiver<bool>,
}

impl AppState {
    /// Create an empty AppState that logs notifications
    pub fn new(port: u16, host: String) -> Self {
        Self::with_notifier(port, host, Arc::new(LogNotifier))
    }

    pub fn with_notifier(port: u16, host: String, notifier: Arc<dyn Notifier>) -> Self {
        let (state_change_tx, _) = broadcast::channel(100);
        let (reconciler_active_tx, reconciler_active_rx) = watch::channel(false);

        Self {
            store: Arc::new(Mutex::new(TimerStore::new())),
            notices: Arc::new(Mutex::new(Notices::new())),
            notifier,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            state_change_tx,
            reconciler_active_tx,
            _reconciler_active_rx: reconciler_active_rx,
        }
    }

    /// Apply a mutation to the store and notify observers if anything changed.
    ///
    /// The updater receives the instant of the mutation; the whole update is
    /// applied under one lock so readers never see a partial result.
    pub fn update_store<F, T>(&self, action: &str, updater: F) -> Result<T, String>
    where
        F: FnOnce(&mut TimerStore, DateTime<Utc>) -> T,
    {
        let now = Utc::now();
        let mut store = self.store.lock()
            .map_err(|e| format!("Failed to lock timer store: {}", e))?;

        let before = store.clone();
        let result = updater(&mut *store, now);
        if *store == before {
            debug!("Action {} left the store unchanged", action);
            return Ok(result);
        }

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(now);
        }

        // Broadcast while still holding the store so observers receive
        // snapshots in commit order. No receivers is fine: observers may
        // not have subscribed yet.
        if self.state_change_tx.receiver_count() > 0 {
            if let Err(e) = self.state_change_tx.send(store.snapshot()) {
                warn!("Failed to send state change notification: {}", e);
            }
        }
        drop(store);

        Ok(result)
    }

    /// Read from the store without mutating it
    pub fn with_store<F, T>(&self, reader: F) -> Result<T, String>
    where
        F: FnOnce(&TimerStore) -> T,
    {
        self.store.lock()
            .map(|store| reader(&store))
            .map_err(|e| format!("Failed to lock timer store: {}", e))
    }

    pub fn snapshot(&self) -> Result<Snapshot, String> {
        self.with_store(TimerStore::snapshot)
    }

    pub fn any_running(&self) -> Result<bool, String> {
        self.with_store(TimerStore::any_running)
    }

    /// Replace the store with a persisted snapshot; a rejected snapshot
    /// leaves the current state in place and is reported as a notice
    pub fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), LoadError> {
        let outcome = self
            .update_store("load", |store, _| store.load_snapshot(snapshot))
            .unwrap_or_else(|e| {
                warn!("{}", e);
                Ok(())
            });

        match &outcome {
            Ok(()) => info!("Restored saved timer data"),
            Err(e) => {
                warn!("Rejected saved timer data: {}", e);
                self.add_notice(NoticeLevel::Warning, format!("Error loading saved data: {}", e));
            }
        }
        outcome
    }

    /// Deliver a notification and record it as a notice
    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(&notification);
        self.add_notice(NoticeLevel::Info, notification.message());
    }

    pub fn add_notice(&self, level: NoticeLevel, message: String) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(level, message),
            Err(e) => warn!("Failed to lock notices: {}", e),
        }
    }

    pub fn get_notices(&self) -> Result<Vec<Notice>, String> {
        self.notices.lock()
            .map(|notices| notices.list())
            .map_err(|e| format!("Failed to lock notices: {}", e))
    }

    pub fn set_reconciler_active(&self, active: bool) {
        self.reconciler_active_tx.send_replace(active);
    }

    pub fn is_reconciler_active(&self) -> bool {
        *self.reconciler_active_tx.borrow()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
