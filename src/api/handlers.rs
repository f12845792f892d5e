//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::{
    services::persistence::export_filename,
    state::{group, AppState, HistoryEntry, Notice, TimerCategory, TimerStore},
};
use super::{
    requests::{CreateTimerRequest, UpdateTimerRequest, ValidationError},
    responses::{
        CategoryActionResponse, CategoryView, ErrorResponse, HealthResponse, StatusResponse,
        TimerView,
    },
};

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn internal_error(e: String) -> ApiError {
    error!("Failed to access timer store: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal state error")),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("Timer {} not found", id))),
    )
}

fn bad_request(e: ValidationError) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
}

/// Look a timer up after an operation; a miss is reported as 404
fn timer_view(state: &AppState, id: &str) -> ApiResult<TimerView> {
    let now = Utc::now();
    state
        .with_store(|store| store.get(id).cloned())
        .map_err(internal_error)?
        .map(|timer| Json(TimerView::new(timer, now)))
        .ok_or_else(|| not_found(id))
}

/// Apply a single-timer operation; a timer in the wrong status is left as it is
fn timer_action<F>(state: &AppState, id: &str, action: &str, op: F) -> ApiResult<TimerView>
where
    F: FnOnce(&mut TimerStore, &str, DateTime<Utc>) -> bool,
{
    let applied = state
        .update_store(action, |store, now| op(store, id, now))
        .map_err(internal_error)?;
    if applied {
        info!("Timer {} {}", id, action);
    }
    timer_view(state, id)
}

/// Apply a bulk operation to a category; a name that matches no category
/// affects no timers
fn category_action<F>(state: &AppState, name: &str, action: &str, op: F) -> ApiResult<CategoryActionResponse>
where
    F: FnOnce(&mut TimerStore, TimerCategory, DateTime<Utc>) -> usize,
{
    let affected = match name.parse::<TimerCategory>() {
        Ok(category) => state
            .update_store(action, |store, now| op(store, category, now))
            .map_err(internal_error)?,
        Err(e) => {
            debug!("{}", e);
            0
        }
    };
    info!("Category {} {}: {} timers affected", name, action, affected);

    Ok(Json(CategoryActionResponse {
        category: name.to_string(),
        action: action.to_string(),
        affected,
        timestamp: Utc::now(),
    }))
}

/// Handle GET /timers - List all timers
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TimerView>> {
    let now = Utc::now();
    let timers = state
        .with_store(|store| store.timers().to_vec())
        .map_err(internal_error)?;
    Ok(Json(timers.into_iter().map(|t| TimerView::new(t, now)).collect()))
}

/// Handle POST /timers - Validate and create a paused timer
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTimerRequest>,
) -> Result<(StatusCode, Json<TimerView>), ApiError> {
    let timer = request.into_timer().map_err(bad_request)?;
    let view = TimerView::new(timer.clone(), Utc::now());

    info!("Creating timer {} ({}s, {})", timer.name, timer.duration, timer.category);
    state
        .update_store("create", |store, _| store.create(timer))
        .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    timer_view(&state, &id)
}

/// Handle PATCH /timers/:id - Replace name, category or halfway flag
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTimerRequest>,
) -> ApiResult<TimerView> {
    request.validate().map_err(bad_request)?;
    state
        .update_store("update", |store, _| {
            let updated = store.get(&id).map(|timer| request.apply(timer));
            updated.map(|timer| store.update(timer))
        })
        .map_err(internal_error)?;
    timer_view(&state, &id)
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .update_store("delete", |store, _| store.delete(&id))
        .map_err(internal_error)?;

    if deleted {
        info!("Deleted timer {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    timer_action(&state, &id, "start", |store, id, now| store.start(id, now.timestamp_millis()))
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    timer_action(&state, &id, "pause", |store, id, now| store.pause(id, now.timestamp_millis()))
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    timer_action(&state, &id, "reset", |store, id, _| store.reset(id))
}

/// Handle POST /timers/:id/complete
pub async fn complete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    timer_action(&state, &id, "complete", |store, id, _| store.complete(id))
}

/// Handle GET /categories - Group timers by category
pub async fn categories_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<CategoryView>> {
    let now = Utc::now();
    let groups = state
        .with_store(|store| group(store.timers()))
        .map_err(internal_error)?;
    Ok(Json(groups.into_iter().map(|g| CategoryView::new(g, now)).collect()))
}

/// Handle POST /categories/:name/start
pub async fn start_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<CategoryActionResponse> {
    category_action(&state, &name, "start", |store, category, now| {
        store.start_category(category, now.timestamp_millis())
    })
}

/// Handle POST /categories/:name/pause
pub async fn pause_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<CategoryActionResponse> {
    category_action(&state, &name, "pause", |store, category, now| {
        store.pause_category(category, now.timestamp_millis())
    })
}

/// Handle POST /categories/:name/reset
pub async fn reset_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<CategoryActionResponse> {
    category_action(&state, &name, "reset", |store, category, _| store.reset_category(category))
}

/// Handle GET /history - Completed runs, most recent first
pub async fn history_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<HistoryEntry>> {
    state
        .with_store(|store| store.history().to_vec())
        .map(Json)
        .map_err(internal_error)
}

/// Handle GET /export - Download the full snapshot as JSON
pub async fn export_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.snapshot().map_err(internal_error)?;
    let body = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| internal_error(e.to_string()))?;
    let filename = export_filename(Utc::now().date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    ))
}

/// Handle GET /notices - Recent user-facing notices
pub async fn notices_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Notice>> {
    state.get_notices().map(Json).map_err(internal_error)
}

/// Handle GET /status - Return current store and reconciler status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let (timers, running, completed, history_entries) = state
        .with_store(|store| {
            let completed = store.timers().iter().filter(|t| t.is_completed()).count();
            (store.timers().len(), store.running_count(), completed, store.history().len())
        })
        .map_err(internal_error)?;

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timers,
        running,
        completed,
        history_entries,
        reconciler_active: state.is_reconciler_active(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
