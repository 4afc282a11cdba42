use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::WorkoutDetail;
use crate::types::{TenantId, WorkoutInput};

/// POST /api/workouts - create a workout with its exercises and sets
pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Json(input): Json<WorkoutInput>,
) -> ApiResult<Value> {
    let id = state.workouts.create_workout(&tenant, input).await?;
    Ok(ApiResponse::created(json!({ "id": id })))
}

/// GET /api/workouts/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<i64>,
) -> ApiResult<WorkoutDetail> {
    let workout = state.workouts.get_workout(&tenant, id).await?;
    Ok(ApiResponse::success(workout))
}

/// PUT /api/workouts/:id - replace the workout's fields, and its sets when
/// the body carries `exercises`
pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<i64>,
    Json(input): Json<WorkoutInput>,
) -> ApiResult<Value> {
    state.workouts.update_workout(&tenant, id, input).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}

/// DELETE /api/workouts/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    state.workouts.delete_workout(&tenant, id).await?;
    Ok(ApiResponse::no_content())
}
