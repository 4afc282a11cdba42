//! Shared types used across the codebase

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::records::estimator::{estimate_set, max_record_value};

const MAX_TENANT_ID_LEN: usize = 128;
const MAX_EXERCISE_NAME_LEN: usize = 200;
const MAX_TEXT_LEN: usize = 4000;

/// Authenticated tenant identity. Only constructed through validation, so a
/// value of this type is always safe to bind as the row-scoping setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, InputError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InputError::new("tenant", "tenant id must not be empty"));
        }
        if raw.len() > MAX_TENANT_ID_LEN {
            return Err(InputError::new("tenant", "tenant id is too long"));
        }
        if raw.chars().any(char::is_control) {
            return Err(InputError::new("tenant", "tenant id contains control characters"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field-level input validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputError {
    pub field: String,
    pub message: String,
}

impl InputError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for InputError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    Warmup,
    Working,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Warmup => "warmup",
            SetType::Working => "working",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInput {
    pub weight: Option<i32>,
    pub reps: i32,
    #[serde(default = "default_set_type")]
    pub set_type: SetType,
}

fn default_set_type() -> SetType {
    SetType::Working
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseInput {
    pub name: String,
    #[serde(default)]
    pub sets: Vec<SetInput>,
}

/// Body of a workout create or update.
///
/// On update, `exercises: None` keeps the stored sets and only replaces the
/// workout's own fields; `Some(..)` replaces every set of the workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub exercises: Option<Vec<ExerciseInput>>,
}

impl WorkoutInput {
    pub fn validate(&self) -> Result<(), InputError> {
        check_text("notes", self.notes.as_deref())?;
        check_text("focus", self.focus.as_deref())?;

        for (i, exercise) in self.exercises.iter().flatten().enumerate() {
            if exercise.name.trim().is_empty() {
                return Err(InputError::new(
                    format!("exercises[{}].name", i),
                    "exercise name must not be empty",
                ));
            }
            if exercise.name.len() > MAX_EXERCISE_NAME_LEN {
                return Err(InputError::new(
                    format!("exercises[{}].name", i),
                    "exercise name is too long",
                ));
            }
            for (j, set) in exercise.sets.iter().enumerate() {
                if set.reps < 1 {
                    return Err(InputError::new(
                        format!("exercises[{}].sets[{}].reps", i, j),
                        "reps must be at least 1",
                    ));
                }
                if matches!(set.weight, Some(w) if w < 0) {
                    return Err(InputError::new(
                        format!("exercises[{}].sets[{}].weight", i, j),
                        "weight must not be negative",
                    ));
                }
                if estimate_set(set.weight, set.reps) >= max_record_value() {
                    return Err(InputError::new(
                        format!("exercises[{}].sets[{}]", i, j),
                        "set is too heavy to record",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_text(field: &str, value: Option<&str>) -> Result<(), InputError> {
    match value {
        Some(v) if v.len() > MAX_TEXT_LEN => Err(InputError::new(field, "value is too long")),
        _ => Ok(()),
    }
}

/// How a personal-record override request is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    Manual,
    Recompute,
}

impl FromStr for RecordMode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(RecordMode::Manual),
            "recompute" => Ok(RecordMode::Recompute),
            other => Err(InputError::new("mode", format!("unknown mode '{}'", other))),
        }
    }
}

/// Body of `PUT /api/exercises/:id/personal-record`. The mode stays a raw
/// string here so an unknown mode surfaces as a validation error rather
/// than a JSON rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonalRecordInput {
    pub mode: String,
    #[serde(default)]
    pub value: Option<Decimal>,
}
