//! External collaborator module
//!
//! This module contains the persistence bridge for timer snapshots and the
//! notifier that delivers timer events.

pub mod notifier;
pub mod persistence;

// Re-export main types
pub use notifier::{LogNotifier, Notification, Notifier};
pub use persistence::{
    export_filename, restore_snapshot, JsonFileStore, PersistenceError, SnapshotStore,
};
