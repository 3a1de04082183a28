//! Read and administrative endpoints over stored task records.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use taskboard_core::{TaskQuery, TaskStore};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::task::{
    BulkDeleteRequest, BulkDeleteResponse, ListTasksQuery, TaskPageResponse, TaskResponse,
};
use crate::state::AppState;

/// Upper bound on ids per bulk delete, well under SQLite's bound-parameter limit.
const MAX_BULK_DELETE: usize = 1000;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, get_task, delete_task, bulk_delete_tasks),
    components(schemas(TaskResponse, TaskPageResponse, BulkDeleteRequest, BulkDeleteResponse))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/bulk-delete", post(bulk_delete_tasks))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "One page of matching tasks", body = TaskPageResponse),
        (status = 400, description = "Bad query parameter"),
        (status = 401, description = "Missing or wrong access token"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListTasksQuery>,
) -> Result<Json<TaskPageResponse>, ServerError> {
    let query = TaskQuery::try_from(q)?;
    let page = state.store.find_tasks(&query).await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task retrieved", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let record = state
        .store
        .get_task(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("task {id} not found")))?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    if !state.store.delete_task(&id).await? {
        return Err(ServerError::NotFound(format!("task {id} not found")));
    }
    info!(task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/tasks/bulk-delete",
    tag = "tasks",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Listed tasks deleted", body = BulkDeleteResponse),
        (status = 400, description = "Empty or oversized id list"),
    )
)]
pub async fn bulk_delete_tasks(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ServerError> {
    if body.task_ids.is_empty() {
        return Err(ServerError::BadRequest("no task ids provided".to_owned()));
    }
    if body.task_ids.len() > MAX_BULK_DELETE {
        return Err(ServerError::BadRequest(format!(
            "at most {MAX_BULK_DELETE} task ids per request"
        )));
    }
    let deleted = state.store.delete_tasks(&body.task_ids).await?;
    info!(requested = body.task_ids.len(), deleted, "tasks bulk deleted");
    Ok(Json(BulkDeleteResponse { deleted }))
}
