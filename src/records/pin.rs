//! Direct edits of an exercise's personal record, outside workout writes.

use rust_decimal::Decimal;
use tracing::info;

use crate::database::tenant_scope::TenantScope;
use crate::records::estimator::{max_record_value, RECORD_SCALE};
use crate::records::maintainer;
use crate::records::state::{RecordEvent, RecordState};
use crate::services::error::ServiceError;
use crate::types::RecordMode;

/// `Manual` stores `value` verbatim (or clears the record when `None`) and
/// detaches it from any workout until the next `Recompute`.
pub async fn set_personal_record(
    scope: &mut TenantScope,
    exercise_id: i64,
    mode: RecordMode,
    value: Option<Decimal>,
) -> Result<RecordState, ServiceError> {
    let event = match mode {
        RecordMode::Manual => {
            if matches!(value, Some(v) if v < Decimal::ZERO) {
                return Err(ServiceError::validation("value", "personal record must not be negative"));
            }
            if matches!(value, Some(v) if v >= max_record_value()) {
                return Err(ServiceError::validation("value", "personal record is too large"));
            }
            RecordEvent::Pinned(value.map(|v| v.round_dp(RECORD_SCALE)))
        }
        RecordMode::Recompute => RecordEvent::RecomputeRequested,
    };

    let locked = scope.lock_records(&[exercise_id]).await?;
    let Some(record) = locked.first() else {
        return Err(ServiceError::not_found("exercise", exercise_id));
    };

    let next = maintainer::apply(scope, exercise_id, record.state(), event).await?;
    info!(
        "Personal record of exercise {} set via {:?} for tenant '{}'",
        exercise_id,
        mode,
        scope.tenant()
    );
    Ok(next)
}
