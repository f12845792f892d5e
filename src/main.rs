//! Timer Deck - A state-managed HTTP server for categorized countdown timers
//!
//! This is the main entry point for the timer-deck application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use timer_deck::{
    config::Config,
    state::AppState,
    api::create_router,
    services::{restore_snapshot, JsonFileStore, SnapshotStore},
    tasks::{persistence_writer_task, save_snapshot_blocking, TickReconciler, TICK_PERIOD},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("timer_deck={},tower_http=info", config.log_level()))
        .init();

    info!("Starting timer-deck server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, data_file={}",
          config.host, config.port, config.data_file.display());

    // Create application state and restore the saved snapshot before any ticking
    let state = Arc::new(AppState::new(config.port, config.host.clone()));
    let persistence: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(&config.data_file));
    restore_snapshot(&state, persistence.as_ref());

    // Persist every store change
    let writer = tokio::spawn(persistence_writer_task(
        Arc::clone(&state),
        Arc::clone(&persistence),
    ));

    // Start the tick reconciler; it idles until a timer is running
    let reconciler = TickReconciler::new(Arc::clone(&state), TICK_PERIOD);
    reconciler.start();

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET/POST          /timers                 - List or create timers");
    info!("  GET/PATCH/DELETE  /timers/:id             - Inspect, update or delete a timer");
    info!("  POST              /timers/:id/<action>    - start, pause, reset, complete");
    info!("  GET               /categories             - Timers grouped by category");
    info!("  POST              /categories/:name/<action> - start, pause, reset a category");
    info!("  GET               /history                - Completed timers");
    info!("  GET               /export                 - Download timer data");
    info!("  GET               /notices                - Recent notices");
    info!("  GET               /status                 - Server and timer status");
    info!("  GET               /health                 - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    reconciler.stop();
    writer.abort();

    // Final save so nothing queued behind the writer is lost
    match state.snapshot() {
        Ok(snapshot) => {
            save_snapshot_blocking(Arc::clone(&state), Arc::clone(&persistence), snapshot).await;
        }
        Err(e) => tracing::error!("Failed to read timer store for final save: {}", e),
    }

    info!("Server shutdown complete");
    Ok(())
}
