//! Persistence writer background task

use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, error, info, warn};

use crate::{
    services::persistence::SnapshotStore,
    state::{AppState, NoticeLevel, Snapshot},
};

/// Background task that saves the store after every change.
///
/// Changes that queue up while a save is in progress are coalesced into a
/// single write of the newest snapshot. A failed save is reported and the
/// next change simply tries again.
pub async fn persistence_writer_task(state: Arc<AppState>, store: Arc<dyn SnapshotStore>) {
    info!("Starting persistence writer task");

    let mut state_rx = state.state_change_tx.subscribe();

    loop {
        let mut latest = match state_rx.recv().await {
            Ok(snapshot) => snapshot,
            Err(RecvError::Lagged(skipped)) => {
                debug!("Persistence writer skipped {} changes, saving current state", skipped);
                match state.snapshot() {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        error!("Failed to read timer store: {}", e);
                        continue;
                    }
                }
            }
            Err(RecvError::Closed) => break,
        };

        loop {
            match state_rx.try_recv() {
                Ok(snapshot) => latest = snapshot,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        save_snapshot_blocking(Arc::clone(&state), Arc::clone(&store), latest).await;
    }

    info!("Persistence writer task finished");
}

/// Run [`save_snapshot`] on the blocking pool so file I/O never stalls the runtime
pub async fn save_snapshot_blocking(
    state: Arc<AppState>,
    store: Arc<dyn SnapshotStore>,
    snapshot: Snapshot,
) -> bool {
    let save = tokio::task::spawn_blocking(move || save_snapshot(&state, store.as_ref(), &snapshot));
    match save.await {
        Ok(saved) => saved,
        Err(e) => {
            error!("Save task failed: {}", e);
            false
        }
    }
}

/// Save once, turning a failure into a user-facing notice
fn save_snapshot(state: &AppState, store: &dyn SnapshotStore, snapshot: &Snapshot) -> bool {
    match store.save(snapshot) {
        Ok(()) => {
            debug!("Saved {} timers, {} history entries", snapshot.timers.len(), snapshot.history.len());
            true
        }
        Err(e) => {
            warn!("Failed to save timer data: {}", e);
            state.add_notice(NoticeLevel::Warning, format!("Error saving data: {}", e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{
        services::persistence::{JsonFileStore, PersistenceError},
        state::{Timer, TimerCategory},
    };

    #[derive(Default)]
    struct FailingStore {
        attempts: Mutex<usize>,
    }

    impl SnapshotStore for FailingStore {
        fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
            Ok(None)
        }

        fn save(&self, _snapshot: &Snapshot) -> Result<(), PersistenceError> {
            *self.attempts.lock().unwrap() += 1;
            Err(PersistenceError::Io {
                path: "unavailable".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded"),
            })
        }
    }

    #[derive(Default)]
    struct SlowStore {
        saves: Mutex<usize>,
    }

    impl SnapshotStore for SlowStore {
        fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
            Ok(None)
        }

        fn save(&self, _snapshot: &Snapshot) -> Result<(), PersistenceError> {
            std::thread::sleep(Duration::from_millis(300));
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_saves_do_not_stall_the_runtime() {
        let store = Arc::new(SlowStore::default());
        let state = Arc::new(AppState::new(0, "127.0.0.1".to_string()));
        let writer = tokio::spawn(persistence_writer_task(Arc::clone(&state), store.clone()));
        tokio::task::yield_now().await;

        let started = Instant::now();
        state
            .update_store("create", |store, _| store.create(Timer::new("A", TimerCategory::Other, 5, false)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*store.saves.lock().unwrap(), 1);
        writer.abort();
    }

    #[tokio::test]
    async fn writes_every_change_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFileStore::new(dir.path().join("timers.json"));
        let state = Arc::new(AppState::new(0, "127.0.0.1".to_string()));
        let writer = tokio::spawn(persistence_writer_task(Arc::clone(&state), Arc::new(file.clone())));
        tokio::task::yield_now().await;

        let timer = Timer::new("Focus", TimerCategory::Work, 60, true);
        state.update_store("create", |store, _| store.create(timer)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(file.load().unwrap(), Some(state.snapshot().unwrap()));
        writer.abort();
    }

    #[tokio::test]
    async fn save_failure_keeps_state_and_reports() {
        let store = Arc::new(FailingStore::default());
        let state = Arc::new(AppState::new(0, "127.0.0.1".to_string()));
        let writer = tokio::spawn(persistence_writer_task(Arc::clone(&state), store.clone()));
        tokio::task::yield_now().await;

        state
            .update_store("create", |store, _| store.create(Timer::new("A", TimerCategory::Other, 5, false)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        state
            .update_store("create", |store, _| store.create(Timer::new("B", TimerCategory::Other, 5, false)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(state.snapshot().unwrap().timers.len(), 2);
        assert_eq!(*store.attempts.lock().unwrap(), 2);
        let notices = state.get_notices().unwrap();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        writer.abort();
    }
}
