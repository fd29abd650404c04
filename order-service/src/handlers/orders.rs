//! Order handlers: creation, financial edits, assignment, stage moves, notes.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::models::{ActivityLog, Actor, NoteKind, Order, WorkItem};
use crate::services::lifecycle::{NewOrder, OrderItemsUpdate, OrderPayment};
use crate::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AssignEngineerRequest {
    pub engineer_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveStageRequest {
    pub stage_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AddNoteRequest {
    pub note: String,
    /// Defaults to an internal note.
    pub kind: Option<NoteKind>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileOrderResponse {
    pub order: Order,
    pub moved_from: Option<String>,
    pub moved_to: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.engine.create_order(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.get_order(&actor, &id).await?))
}

/// DELETE /orders/:id
pub async fn delete_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.engine.soft_delete_order(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /orders/:id/items
pub async fn update_order_items(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<OrderItemsUpdate>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.update_order_items(&actor, &id, req).await?))
}

/// POST /orders/:id/assign
pub async fn assign_engineer(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<AssignEngineerRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .engine
        .assign_engineer(&actor, &id, &req.engineer_id, req.notes)
        .await?;
    Ok(Json(order))
}

/// POST /orders/:id/stage
pub async fn move_stage(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<MoveStageRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .engine
        .move_stage(&actor, &id, &req.stage_id, req.notes)
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/:id/status
pub async fn update_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .engine
        .update_order_status(&actor, &id, &req.status)
        .await?;
    Ok(Json(order))
}

/// POST /orders/:id/payments
pub async fn add_order_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<OrderPayment>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.add_payment(&actor, &id, req).await?))
}

/// POST /orders/:id/notes
pub async fn add_order_note(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<AddNoteRequest>,
) -> Result<Json<Order>, AppError> {
    let kind = req.kind.unwrap_or(NoteKind::Internal);
    let order = state.engine.add_note(&actor, &id, &req.note, kind).await?;
    Ok(Json(order))
}

/// GET /orders/:id/activity
pub async fn list_order_activity(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Vec<ActivityLog>>, AppError> {
    Ok(Json(state.engine.list_activity(&actor, &id).await?))
}

/// POST /orders/:id/reconcile
///
/// Recomputes the sub-task rollup and the automatic stage from the stored sub-tasks.
pub async fn reconcile_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<ReconcileOrderResponse>, AppError> {
    let outcome = state.engine.reconcile_order(&actor, &id).await?;
    let (moved_from, moved_to) = match outcome.moved {
        Some((from, to)) => (Some(from), Some(to)),
        None => (None, None),
    };
    Ok(Json(ReconcileOrderResponse {
        order: outcome.order,
        moved_from,
        moved_to,
    }))
}

/// GET /engineers/:id/work-items
pub async fn list_work_items(
    State(state): State<AppState>,
    actor: Actor,
    Path(engineer_id): Path<String>,
) -> Result<Json<Vec<WorkItem>>, AppError> {
    Ok(Json(state.engine.work_items(&actor, &engineer_id).await?))
}
