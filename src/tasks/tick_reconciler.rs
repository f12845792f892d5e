//! Tick reconciler background task
//!
//! Running timers are not scheduled individually. While at least one timer is
//! running, a single cadence samples the wall clock once per period and
//! re-derives every running timer's remaining time from its `last_started`
//! baseline. The cadence stops as soon as nothing is running and is brought
//! back by the next store change that starts a timer.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use chrono::{DateTime, Utc};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    services::notifier::Notification,
    state::{timer::elapsed_seconds, AppState, HistoryEntry, Snapshot, Timer, TimerStore},
};

/// Fixed reconciliation cadence
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Reconcile every running timer against `now`, returning the events raised.
///
/// Timers whose remaining time did not change by a whole second are left
/// alone, which keeps their `last_started` baseline and its fractional
/// second intact.
pub fn reconcile_tick(store: &mut TimerStore, now: DateTime<Utc>) -> Vec<Notification> {
    let now_ms = now.timestamp_millis();
    let running: Vec<Timer> = store
        .timers()
        .iter()
        .filter(|timer| timer.is_running() && timer.last_started.is_some())
        .cloned()
        .collect();

    let mut events = Vec::new();
    for timer in running {
        let Some(started) = timer.last_started else {
            continue;
        };
        let remaining = timer.remaining_time.saturating_sub(elapsed_seconds(started, now_ms));
        if remaining == timer.remaining_time && remaining > 0 {
            continue;
        }

        if remaining == 0 {
            store.complete(&timer.id);
            store.add_history(HistoryEntry::for_timer(&timer, now));
            events.push(Notification::Completion {
                timer_name: timer.name.clone(),
            });
            continue;
        }

        let crossed = timer.halfway_alert
            && crossed_halfway(timer.duration, timer.remaining_time, remaining);
        let name = timer.name.clone();
        store.update(Timer {
            remaining_time: remaining,
            last_started: Some(now_ms),
            ..timer
        });
        if crossed {
            events.push(Notification::Halfway { timer_name: name });
        }
    }
    events
}

/// Edge-triggered halfway check: `previous` above half, `current` at or below.
///
/// Compared on doubled values so odd durations need no rounding; a 5 second
/// timer crosses when going from 3 or more to 2 or less.
pub fn crossed_halfway(duration: u64, previous: u64, current: u64) -> bool {
    previous.saturating_mul(2) > duration && current.saturating_mul(2) <= duration
}

/// Apply one tick to the shared state and deliver its notifications.
/// Returns whether any timer is still running afterwards.
pub fn apply_tick(state: &AppState) -> Result<bool, String> {
    let (events, still_running) = state.update_store("tick", |store, now| {
        let events = reconcile_tick(store, now);
        (events, store.any_running())
    })?;

    for event in events {
        if matches!(event, Notification::Completion { .. }) {
            info!("Timer {} completed", event.timer_name());
        }
        state.notify(event);
    }
    Ok(still_running)
}

/// Handle on the reconciler task; at most one cadence exists per handle
#[derive(Debug)]
pub struct TickReconciler {
    state: Arc<AppState>,
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TickReconciler {
    pub fn new(state: Arc<AppState>, period: Duration) -> Self {
        Self {
            state,
            period,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the reconciler task unless it is already alive
    pub fn start(&self) {
        let Ok(mut handle) = self.handle.lock() else {
            error!("Failed to lock reconciler handle");
            return;
        };
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Tick reconciler already running");
            return;
        }

        let state = Arc::clone(&self.state);
        let period = self.period;
        *handle = Some(tokio::spawn(async move {
            tick_reconciler_task(state, period).await;
        }));
    }

    /// Tear the task down; safe to call repeatedly
    pub fn stop(&self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
                info!("Tick reconciler stopped");
            }
        }
        self.state.set_reconciler_active(false);
    }

    pub fn is_alive(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for TickReconciler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background task that runs the tick cadence whenever a timer is running
pub async fn tick_reconciler_task(state: Arc<AppState>, period: Duration) {
    info!("Starting tick reconciler task");

    let mut state_rx = state.state_change_tx.subscribe();

    loop {
        match state.any_running() {
            Ok(true) => {
                if !run_cadence(&state, &mut state_rx, period).await {
                    break;
                }
            }
            Ok(false) => {}
            Err(e) => error!("Failed to read timer store: {}", e),
        }

        // Idle until the store changes
        match state_rx.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("Reconciler skipped {} state changes", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    state.set_reconciler_active(false);
    info!("Tick reconciler task finished");
}

/// Tick until no timer is running. Returns `false` once the change channel closes.
async fn run_cadence(
    state: &AppState,
    state_rx: &mut broadcast::Receiver<Snapshot>,
    period: Duration,
) -> bool {
    info!("Timers running, activating tick cadence");
    state.set_reconciler_active(true);

    // A fresh phase each activation; the first tick lands one period from now
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let open = loop {
        tokio::select! {
            _ = interval.tick() => {
                match apply_tick(state) {
                    Ok(true) => {}
                    Ok(false) => break true,
                    Err(e) => error!("Failed to apply tick: {}", e),
                }
            }

            change = state_rx.recv() => {
                match change {
                    Ok(snapshot) => {
                        if !snapshot.any_running() {
                            break true;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Reconciler lagged behind {} state changes", skipped);
                        if !state.any_running().unwrap_or(true) {
                            break true;
                        }
                    }
                    Err(RecvError::Closed) => break false,
                }
            }
        }
    };

    info!("No timers running, deactivating tick cadence");
    state.set_reconciler_active(false);
    open
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::TimeZone;

    use super::*;
    use crate::{
        services::notifier::Notifier,
        state::{TimerCategory, TimerStatus},
    };

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn store_with(duration: u64, halfway_alert: bool) -> (TimerStore, String) {
        let mut store = TimerStore::new();
        let timer = Timer::new("Tea", TimerCategory::Cooking, duration, halfway_alert);
        let id = timer.id.clone();
        store.create(timer);
        (store, id)
    }

    /// Tick every second from `from_ms` through `to_ms` inclusive
    fn tick_range(store: &mut TimerStore, from_ms: i64, to_ms: i64) -> Vec<Notification> {
        (from_ms..=to_ms)
            .step_by(1000)
            .flat_map(|ms| reconcile_tick(store, at(ms)))
            .collect()
    }

    fn halfway_count(events: &[Notification]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Notification::Halfway { .. }))
            .count()
    }

    #[test]
    fn one_second_timer_completes_on_first_tick() {
        let (mut store, id) = store_with(1, false);
        store.start(&id, 0);

        let events = reconcile_tick(&mut store, at(1_000));

        let timer = store.get(&id).unwrap();
        assert_eq!(timer.status, TimerStatus::Completed);
        assert_eq!(timer.remaining_time, 0);
        assert!(timer.last_started.is_none());
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].timer_id, id);
        assert_eq!(events, vec![Notification::Completion { timer_name: "Tea".to_string() }]);

        // Later ticks see a completed timer and do nothing
        assert!(reconcile_tick(&mut store, at(2_000)).is_empty());
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn sub_second_tick_leaves_timer_untouched() {
        let (mut store, id) = store_with(10, false);
        store.start(&id, 0);
        let before = store.clone();

        assert!(reconcile_tick(&mut store, at(999)).is_empty());
        assert_eq!(store, before);

        reconcile_tick(&mut store, at(1_500));
        let timer = store.get(&id).unwrap();
        assert_eq!(timer.remaining_time, 9);
        assert_eq!(timer.last_started, Some(1_500));
    }

    #[test]
    fn late_tick_catches_up() {
        let (mut store, id) = store_with(60, false);
        store.start(&id, 0);
        reconcile_tick(&mut store, at(25_000));
        assert_eq!(store.get(&id).unwrap().remaining_time, 35);

        let events = reconcile_tick(&mut store, at(120_000));
        assert_eq!(events.len(), 1);
        assert!(store.get(&id).unwrap().is_completed());
    }

    #[test]
    fn halfway_fires_once_per_cycle() {
        let (mut store, id) = store_with(10, true);
        store.start(&id, 0);
        let events = tick_range(&mut store, 1_000, 10_000);

        assert_eq!(halfway_count(&events), 1);
        assert_eq!(events.len(), 2);
        assert!(store.get(&id).unwrap().is_completed());
    }

    #[test]
    fn halfway_not_refired_across_pause_resume_near_midpoint() {
        let (mut store, id) = store_with(10, true);
        store.start(&id, 0);
        let mut events = tick_range(&mut store, 1_000, 5_000);
        assert_eq!(halfway_count(&events), 1);
        assert_eq!(store.get(&id).unwrap().remaining_time, 5);

        store.pause(&id, 5_500);
        store.start(&id, 6_000);
        events.extend(tick_range(&mut store, 7_000, 7_000));
        store.pause(&id, 7_200);
        store.start(&id, 8_000);
        events.extend(tick_range(&mut store, 9_000, 20_000));

        assert_eq!(halfway_count(&events), 1);
        assert!(store.get(&id).unwrap().is_completed());
    }

    #[test]
    fn halfway_passed_while_paused_does_not_alert() {
        let (mut store, id) = store_with(10, true);
        store.start(&id, 0);
        tick_range(&mut store, 1_000, 4_000);

        // The crossing happens inside the pause accounting, not on a tick
        store.pause(&id, 5_200);
        assert_eq!(store.get(&id).unwrap().remaining_time, 5);
        store.start(&id, 6_000);
        let events = tick_range(&mut store, 7_000, 20_000);

        assert_eq!(halfway_count(&events), 0);
        assert!(store.get(&id).unwrap().is_completed());
    }

    #[test]
    fn halfway_fires_when_tick_crosses_after_resume() {
        let (mut store, id) = store_with(10, true);
        store.start(&id, 0);
        tick_range(&mut store, 1_000, 3_000);
        store.pause(&id, 3_500);
        store.start(&id, 10_000);

        let events = tick_range(&mut store, 11_000, 13_000);
        assert_eq!(halfway_count(&events), 1);
    }

    #[test]
    fn timer_already_below_half_never_alerts() {
        let (mut store, id) = store_with(100, true);
        let mut timer = store.get(&id).unwrap().clone();
        timer.remaining_time = 40;
        store.update(timer);
        store.start(&id, 0);

        let events = tick_range(&mut store, 1_000, 40_000);
        assert_eq!(halfway_count(&events), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn disabled_alert_is_silent() {
        let (mut store, id) = store_with(4, false);
        store.start(&id, 0);
        let events = tick_range(&mut store, 1_000, 3_000);
        assert!(events.is_empty());
    }

    #[test]
    fn odd_duration_crosses_exactly_once() {
        assert!(!crossed_halfway(5, 4, 3));
        assert!(crossed_halfway(5, 3, 2));
        assert!(!crossed_halfway(5, 2, 1));
        assert!(crossed_halfway(4, 3, 2));
        assert!(!crossed_halfway(4, 2, 1));

        let (mut store, id) = store_with(5, true);
        store.start(&id, 0);
        let events = tick_range(&mut store, 1_000, 5_000);
        assert_eq!(halfway_count(&events), 1);
    }

    #[test]
    fn timers_reconcile_independently() {
        let mut store = TimerStore::new();
        let short = Timer::new("Short", TimerCategory::Work, 2, false);
        let long = Timer::new("Long", TimerCategory::Study, 30, false);
        let paused = Timer::new("Paused", TimerCategory::Other, 30, false);
        let (short_id, long_id, paused_id) = (short.id.clone(), long.id.clone(), paused.id.clone());
        store.create(short);
        store.create(long);
        store.create(paused);
        store.start(&short_id, 0);
        store.start(&long_id, 0);

        let events = reconcile_tick(&mut store, at(2_000));
        assert_eq!(events.len(), 1);
        assert!(store.get(&short_id).unwrap().is_completed());
        assert_eq!(store.get(&long_id).unwrap().remaining_time, 28);
        assert_eq!(store.get(&paused_id).unwrap().remaining_time, 30);
    }

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        events: StdMutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) {
            self.events.lock().unwrap().push(notification.clone());
        }
    }

    #[test]
    fn apply_tick_delivers_notifications() {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::with_notifier(0, "127.0.0.1".to_string(), notifier.clone());
        let timer = Timer::new("Tea", TimerCategory::Cooking, 1, false);
        let id = timer.id.clone();
        state.update_store("create", |store, _| store.create(timer)).unwrap();
        // Baseline far enough in the past that the next tick completes it
        state
            .update_store("start", |store, now| store.start(&id, now.timestamp_millis() - 1_500))
            .unwrap();

        assert!(!apply_tick(&state).unwrap());
        assert_eq!(notifier.events.lock().unwrap().len(), 1);
        assert_eq!(state.with_store(|s| s.history().len()).unwrap(), 1);
    }

    #[tokio::test]
    async fn cadence_completes_running_timer_and_deactivates() {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(AppState::with_notifier(0, "127.0.0.1".to_string(), notifier.clone()));
        let reconciler = TickReconciler::new(Arc::clone(&state), Duration::from_millis(50));
        reconciler.start();
        reconciler.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(reconciler.is_alive());
        assert!(!state.is_reconciler_active());

        let timer = Timer::new("Tea", TimerCategory::Cooking, 1, false);
        let id = timer.id.clone();
        state.update_store("create", |store, _| store.create(timer)).unwrap();
        state
            .update_store("start", |store, now| store.start(&id, now.timestamp_millis()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(state.is_reconciler_active());

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        let timer = state.with_store(|s| s.get(&id).cloned()).unwrap().unwrap();
        assert_eq!(timer.status, TimerStatus::Completed);
        assert_eq!(state.with_store(|s| s.history().len()).unwrap(), 1);
        assert_eq!(notifier.events.lock().unwrap().len(), 1);
        assert!(!state.is_reconciler_active());

        reconciler.stop();
        reconciler.stop();
        assert!(!reconciler.is_alive());
    }

    #[tokio::test]
    async fn pausing_last_timer_stops_cadence() {
        let state = Arc::new(AppState::new(0, "127.0.0.1".to_string()));
        let reconciler = TickReconciler::new(Arc::clone(&state), Duration::from_millis(50));
        reconciler.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let timer = Timer::new("Focus", TimerCategory::Work, 600, false);
        let id = timer.id.clone();
        state.update_store("create", |store, _| store.create(timer)).unwrap();
        state
            .update_store("start", |store, now| store.start(&id, now.timestamp_millis()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(state.is_reconciler_active());

        state
            .update_store("pause", |store, now| store.pause(&id, now.timestamp_millis()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!state.is_reconciler_active());
        assert!(reconciler.is_alive());
    }
}
