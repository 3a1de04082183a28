//! Lifecycle event ingestion from the task reporter.
//!
//! Each endpoint is an idempotent upsert keyed by the task id in the path.
//! Bodies that fail to deserialize are rejected by the `Json` extractor
//! before anything touches the store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use taskboard_core::{ExecutedEvent, QueuedEvent, StartedEvent};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(task_queued, task_started, task_executed))]
pub struct EventsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/{id}/queued", post(task_queued))
        .route("/tasks/{id}/started", post(task_started))
        .route("/tasks/{id}/executed", post(task_executed))
}

#[utoipa::path(
    post,
    path = "/api/tasks/{id}/queued",
    tag = "events",
    params(("id" = String, Path, description = "Task id assigned by the broker")),
    request_body(content = Value, description = "name, worker, args, kwargs, labels, queued_at"),
    responses(
        (status = 204, description = "Event applied"),
        (status = 401, description = "Missing or wrong access token"),
        (status = 503, description = "Store unavailable; redeliver"),
    )
)]
pub async fn task_queued(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(event): Json<QueuedEvent>,
) -> Result<StatusCode, ServerError> {
    state.reconciler.apply_queued(&id, &event).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/tasks/{id}/started",
    tag = "events",
    params(("id" = String, Path, description = "Task id assigned by the broker")),
    request_body(content = Value, description = "name, worker, args, kwargs, started_at"),
    responses(
        (status = 204, description = "Event applied"),
        (status = 401, description = "Missing or wrong access token"),
        (status = 503, description = "Store unavailable; redeliver"),
    )
)]
pub async fn task_started(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(event): Json<StartedEvent>,
) -> Result<StatusCode, ServerError> {
    state.reconciler.apply_started(&id, &event).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/tasks/{id}/executed",
    tag = "events",
    params(("id" = String, Path, description = "Task id assigned by the broker")),
    request_body(content = Value, description = "finished_at, error, return_value"),
    responses(
        (status = 204, description = "Event applied"),
        (status = 401, description = "Missing or wrong access token"),
        (status = 503, description = "Store unavailable; redeliver"),
    )
)]
pub async fn task_executed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(event): Json<ExecutedEvent>,
) -> Result<StatusCode, ServerError> {
    state.reconciler.apply_executed(&id, &event).await?;
    Ok(StatusCode::NO_CONTENT)
}
