use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workout {
    pub id: i64,
    pub tenant_id: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub focus: Option<String>,
}

/// A stored set joined with its exercise name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutSetRow {
    pub id: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub weight: Option<i32>,
    pub reps: i32,
    pub set_type: String,
    pub exercise_order: i32,
    pub set_order: i32,
}
