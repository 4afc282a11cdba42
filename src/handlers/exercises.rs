use axum::{
    extract::{Extension, Path, State},
    Json,
};

use super::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::records::RecordState;
use crate::services::ExerciseRecord;
use crate::types::{PersonalRecordInput, TenantId};

/// GET /api/exercises/:id - exercise with its cached personal record
pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<i64>,
) -> ApiResult<ExerciseRecord> {
    let exercise = state.workouts.get_exercise(&tenant, id).await?;
    Ok(ApiResponse::success(exercise))
}

/// PUT /api/exercises/:id/personal-record
///
/// `{"mode": "manual", "value": 180.5}` pins a value (`null` clears it);
/// `{"mode": "recompute"}` rebuilds it from the workout history.
pub async fn set_personal_record(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantId>,
    Path(id): Path<i64>,
    Json(input): Json<PersonalRecordInput>,
) -> ApiResult<RecordState> {
    let record = state
        .workouts
        .set_exercise_personal_record(&tenant, id, &input.mode, input.value)
        .await?;
    Ok(ApiResponse::success(record))
}
