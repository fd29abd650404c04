//! Sub-task handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::{Actor, SubTask, SubTaskUpdate};
use crate::services::lifecycle::{NewSubTask, SubTaskChanges, SubTaskNode};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubTaskStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignSubTaskRequest {
    pub assigned_to: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubTaskUpdateRequest {
    pub note: String,
    #[serde(default = "default_update_type")]
    pub update_type: String,
}

fn default_update_type() -> String {
    "comment".to_string()
}

/// POST /orders/:id/sub-tasks
pub async fn create_sub_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<String>,
    Json(req): Json<NewSubTask>,
) -> Result<(StatusCode, Json<SubTask>), AppError> {
    let task = state.engine.create_sub_task(&actor, &order_id, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /orders/:id/sub-tasks
pub async fn list_sub_tasks(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<SubTaskNode>>, AppError> {
    Ok(Json(state.engine.list_sub_tasks(&actor, &order_id).await?))
}

/// GET /sub-tasks/:id
pub async fn get_sub_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<SubTask>, AppError> {
    Ok(Json(state.engine.get_sub_task(&actor, &id).await?))
}

/// PATCH /sub-tasks/:id
pub async fn update_sub_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<SubTaskChanges>,
) -> Result<Json<SubTask>, AppError> {
    Ok(Json(state.engine.update_sub_task(&actor, &id, req).await?))
}

/// DELETE /sub-tasks/:id
pub async fn delete_sub_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_sub_task(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /sub-tasks/:id/status
pub async fn update_sub_task_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<SubTaskStatusRequest>,
) -> Result<Json<SubTask>, AppError> {
    let task = state
        .engine
        .update_sub_task_status(&actor, &id, &req.status, req.notes)
        .await?;
    Ok(Json(task))
}

/// POST /sub-tasks/:id/reassign
pub async fn reassign_sub_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<ReassignSubTaskRequest>,
) -> Result<Json<SubTask>, AppError> {
    let task = state
        .engine
        .reassign_sub_task(&actor, &id, &req.assigned_to, req.notes)
        .await?;
    Ok(Json(task))
}

/// POST /sub-tasks/:id/updates
pub async fn add_sub_task_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<SubTaskUpdateRequest>,
) -> Result<Json<SubTask>, AppError> {
    let task = state
        .engine
        .add_sub_task_update(&actor, &id, &req.note, &req.update_type)
        .await?;
    Ok(Json(task))
}

/// GET /sub-tasks/:id/history
pub async fn sub_task_history(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Vec<SubTaskUpdate>>, AppError> {
    Ok(Json(state.engine.sub_task_history(&actor, &id).await?))
}
