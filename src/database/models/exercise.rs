use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::records::state::RecordState;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub best_value: Option<Decimal>,
    pub best_value_source_workout_id: Option<i64>,
}

/// Cache columns of an exercise row, read under a row lock
#[derive(Debug, Clone, FromRow)]
pub struct LockedRecord {
    pub id: i64,
    pub best_value: Option<Decimal>,
    pub best_value_source_workout_id: Option<i64>,
}

impl LockedRecord {
    pub fn state(&self) -> RecordState {
        RecordState::from_columns(self.best_value, self.best_value_source_workout_id)
    }
}
