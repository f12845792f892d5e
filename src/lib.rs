//! Timer Deck - A state-managed HTTP server for categorized countdown timers
//!
//! This library keeps many independent countdowns accurate with a single
//! periodic reconciliation task, persists the timer store as a JSON snapshot
//! and records every completed run in a history log.

pub mod config;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
