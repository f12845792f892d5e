//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod persistence_writer;
pub mod tick_reconciler;

// Re-export main functions
pub use persistence_writer::{persistence_writer_task, save_snapshot_blocking};
pub use tick_reconciler::{reconcile_tick, tick_reconciler_task, TickReconciler, TICK_PERIOD};
