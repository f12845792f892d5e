//! State management module
//!
//! This module contains the timer data model, the timer store with its state
//! transitions, the derived category view and the shared application state.

pub mod app_state;
pub mod category;
pub mod notices;
pub mod store;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use category::{group, Category};
pub use notices::{Notice, NoticeLevel};
pub use store::{LoadError, TimerStore};
pub use timer::{HistoryEntry, Snapshot, Timer, TimerCategory, TimerStatus, SCHEMA_VERSION};
