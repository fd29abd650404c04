use axum::extract::{Json, State};
use service_core::error::AppError;

use crate::models::{Actor, Stage};
use crate::AppState;

/// GET /stages
pub async fn list_stages(
    State(state): State<AppState>,
    _actor: Actor,
) -> Result<Json<Vec<Stage>>, AppError> {
    let stages = state.engine.stages().list_ordered().await?;
    Ok(Json(stages))
}
