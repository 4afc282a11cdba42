use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::database::models::{Exercise, WorkoutSetRow};
use crate::database::repository::SetPosition;
use crate::database::tenant_scope::{TenantBinder, TenantScope};
use crate::records::maintainer::{self, workout_bests};
use crate::records::pin;
use crate::records::state::{RecordEvent, RecordState};
use crate::services::error::ServiceError;
use crate::types::{ExerciseInput, RecordMode, SetInput, TenantId, WorkoutInput};

/// A workout with its sets grouped by exercise, in stored order
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutDetail {
    pub id: i64,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub focus: Option<String>,
    pub exercises: Vec<WorkoutExercise>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutExercise {
    pub exercise_id: i64,
    pub name: String,
    pub sets: Vec<WorkoutSet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutSet {
    pub id: i64,
    pub weight: Option<i32>,
    pub reps: i32,
    pub set_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseRecord {
    pub id: i64,
    pub name: String,
    pub best_value: Option<Decimal>,
    pub best_value_source_workout_id: Option<i64>,
}

impl From<Exercise> for ExerciseRecord {
    fn from(e: Exercise) -> Self {
        Self {
            id: e.id,
            name: e.name,
            best_value: e.best_value,
            best_value_source_workout_id: e.best_value_source_workout_id,
        }
    }
}

/// Sequences workout writes and personal-record maintenance. Each operation
/// is one tenant-bound transaction: rows and derived records commit together
/// or not at all.
#[derive(Clone)]
pub struct WorkoutService {
    binder: TenantBinder,
}

impl WorkoutService {
    pub fn new(binder: TenantBinder) -> Self {
        Self { binder }
    }

    pub async fn create_workout(&self, tenant: &TenantId, input: WorkoutInput) -> Result<i64, ServiceError> {
        input.validate()?;
        let workout_id = self
            .binder
            .run(tenant, move |scope| {
                let input = input.clone();
                Box::pin(async move { create_in_scope(scope, &input).await })
            })
            .await?;
        info!("Created workout {} for tenant '{}'", workout_id, tenant);
        Ok(workout_id)
    }

    pub async fn update_workout(
        &self,
        tenant: &TenantId,
        workout_id: i64,
        input: WorkoutInput,
    ) -> Result<(), ServiceError> {
        input.validate()?;
        self.binder
            .run(tenant, move |scope| {
                let input = input.clone();
                Box::pin(async move { update_in_scope(scope, workout_id, &input).await })
            })
            .await?;
        info!("Updated workout {} for tenant '{}'", workout_id, tenant);
        Ok(())
    }

    pub async fn delete_workout(&self, tenant: &TenantId, workout_id: i64) -> Result<(), ServiceError> {
        self.binder
            .run(tenant, move |scope| Box::pin(delete_in_scope(scope, workout_id)))
            .await?;
        info!("Deleted workout {} for tenant '{}'", workout_id, tenant);
        Ok(())
    }

    pub async fn get_workout(&self, tenant: &TenantId, workout_id: i64) -> Result<WorkoutDetail, ServiceError> {
        self.binder
            .run(tenant, move |scope| Box::pin(load_workout(scope, workout_id)))
            .await
    }

    pub async fn get_exercise(&self, tenant: &TenantId, exercise_id: i64) -> Result<ExerciseRecord, ServiceError> {
        self.binder
            .run(tenant, move |scope| Box::pin(load_exercise(scope, exercise_id)))
            .await
    }

    /// `mode` is `"manual"` or `"recompute"`; anything else is a validation
    /// error, reported before the database is touched.
    pub async fn set_exercise_personal_record(
        &self,
        tenant: &TenantId,
        exercise_id: i64,
        mode: &str,
        value: Option<Decimal>,
    ) -> Result<RecordState, ServiceError> {
        let mode: RecordMode = mode.parse()?;
        self.binder
            .run(tenant, move |scope| {
                Box::pin(pin::set_personal_record(scope, exercise_id, mode, value))
            })
            .await
    }
}

async fn create_in_scope(scope: &mut TenantScope, input: &WorkoutInput) -> Result<i64, ServiceError> {
    let workout_id = scope.insert_workout(input).await?;
    let exercises = input.exercises.as_deref().unwrap_or_default();

    let ids = resolve_exercises(scope, exercises).await?;
    let bests = workout_bests(workout_id, placed_sets(exercises, &ids));
    let touched: Vec<i64> = bests.keys().copied().collect();

    let locked = scope.lock_records(&touched).await?;
    insert_sets(scope, workout_id, exercises, &ids).await?;

    for record in locked {
        let best = bests.get(&record.id).copied().flatten();
        let event = RecordEvent::Created { workout_id, best };
        maintainer::apply(scope, record.id, record.state(), event).await?;
    }
    Ok(workout_id)
}

async fn update_in_scope(scope: &mut TenantScope, workout_id: i64, input: &WorkoutInput) -> Result<(), ServiceError> {
    if !scope.lock_workout(workout_id).await? {
        return Err(ServiceError::not_found("workout", workout_id));
    }
    scope.update_workout(workout_id, input).await?;

    // Without exercises the stored sets stay as they are, and so do records
    let Some(exercises) = input.exercises.as_deref() else {
        return Ok(());
    };

    let mut affected: BTreeSet<i64> = scope.workout_exercise_ids(workout_id).await?.into_iter().collect();
    affected.extend(scope.exercises_held_by(workout_id).await?);

    let ids = resolve_exercises(scope, exercises).await?;
    affected.extend(ids.values().copied());

    let affected: Vec<i64> = affected.into_iter().collect();
    let locked = scope.lock_records(&affected).await?;

    scope.delete_workout_sets(workout_id).await?;
    insert_sets(scope, workout_id, exercises, &ids).await?;
    let bests = workout_bests(workout_id, placed_sets(exercises, &ids));

    for record in locked {
        let best = bests.get(&record.id).copied().flatten();
        let event = RecordEvent::Updated { workout_id, best };
        maintainer::apply(scope, record.id, record.state(), event).await?;
    }
    Ok(())
}

async fn delete_in_scope(scope: &mut TenantScope, workout_id: i64) -> Result<(), ServiceError> {
    if !scope.lock_workout(workout_id).await? {
        return Err(ServiceError::not_found("workout", workout_id));
    }

    let mut affected: BTreeSet<i64> = scope.workout_exercise_ids(workout_id).await?.into_iter().collect();
    affected.extend(scope.exercises_held_by(workout_id).await?);
    let affected: Vec<i64> = affected.into_iter().collect();
    let locked = scope.lock_records(&affected).await?;

    scope.delete_workout(workout_id).await?;

    for record in locked {
        let event = RecordEvent::Deleted { workout_id };
        maintainer::apply(scope, record.id, record.state(), event).await?;
    }
    Ok(())
}

async fn load_workout(scope: &mut TenantScope, workout_id: i64) -> Result<WorkoutDetail, ServiceError> {
    let workout = scope
        .fetch_workout(workout_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("workout", workout_id))?;
    let rows = scope.fetch_workout_sets(workout_id).await?;

    Ok(WorkoutDetail {
        id: workout.id,
        date: workout.date,
        notes: workout.notes,
        focus: workout.focus,
        exercises: group_sets(rows),
    })
}

async fn load_exercise(scope: &mut TenantScope, exercise_id: i64) -> Result<ExerciseRecord, ServiceError> {
    scope
        .fetch_exercise(exercise_id)
        .await?
        .map(ExerciseRecord::from)
        .ok_or_else(|| ServiceError::not_found("exercise", exercise_id))
}

/// Exercise ids by name. Names are resolved in sorted order so concurrent
/// writers creating the same new exercises take their locks in one order.
async fn resolve_exercises(
    scope: &mut TenantScope,
    exercises: &[ExerciseInput],
) -> Result<BTreeMap<String, i64>, ServiceError> {
    let names: BTreeSet<&str> = exercises.iter().map(|e| e.name.as_str()).collect();
    let mut ids = BTreeMap::new();
    for name in names {
        let id = scope.get_or_create_exercise(name).await?;
        ids.insert(name.to_string(), id);
    }
    Ok(ids)
}

fn placed_sets<'a>(
    exercises: &'a [ExerciseInput],
    ids: &'a BTreeMap<String, i64>,
) -> impl Iterator<Item = (i64, &'a SetInput)> + 'a {
    exercises.iter().flat_map(move |exercise| {
        let id = ids[exercise.name.as_str()];
        exercise.sets.iter().map(move |set| (id, set))
    })
}

async fn insert_sets(
    scope: &mut TenantScope,
    workout_id: i64,
    exercises: &[ExerciseInput],
    ids: &BTreeMap<String, i64>,
) -> Result<(), ServiceError> {
    for (exercise_order, exercise) in exercises.iter().enumerate() {
        let exercise_id = ids[exercise.name.as_str()];
        for (set_order, set) in exercise.sets.iter().enumerate() {
            let position = SetPosition {
                exercise_order: exercise_order as i32,
                set_order: set_order as i32,
            };
            scope.insert_set(workout_id, exercise_id, set, position).await?;
        }
    }
    Ok(())
}

fn group_sets(rows: Vec<WorkoutSetRow>) -> Vec<WorkoutExercise> {
    let mut grouped: Vec<WorkoutExercise> = Vec::new();
    let mut last_order: Option<i32> = None;
    for row in rows {
        let set = WorkoutSet {
            id: row.id,
            weight: row.weight,
            reps: row.reps,
            set_type: row.set_type,
        };
        match grouped.last_mut() {
            Some(current) if last_order == Some(row.exercise_order) => current.sets.push(set),
            _ => grouped.push(WorkoutExercise {
                exercise_id: row.exercise_id,
                name: row.exercise_name,
                sets: vec![set],
            }),
        }
        last_order = Some(row.exercise_order);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SetType;

    fn row(id: i64, exercise_id: i64, name: &str, exercise_order: i32, set_order: i32) -> WorkoutSetRow {
        WorkoutSetRow {
            id,
            exercise_id,
            exercise_name: name.to_string(),
            weight: Some(100),
            reps: 5,
            set_type: "working".to_string(),
            exercise_order,
            set_order,
        }
    }

    #[test]
    fn groups_sets_by_exercise_position() {
        let grouped = group_sets(vec![
            row(1, 10, "Squat", 0, 0),
            row(2, 10, "Squat", 0, 1),
            row(3, 11, "Bench Press", 1, 0),
            row(4, 10, "Squat", 2, 0),
        ]);
        let names: Vec<&str> = grouped.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Squat", "Bench Press", "Squat"]);
        assert_eq!(grouped[0].sets.len(), 2);
    }

    #[test]
    fn placed_sets_follow_input_order() {
        let exercises = vec![
            ExerciseInput {
                name: "Squat".into(),
                sets: vec![
                    SetInput { weight: Some(60), reps: 5, set_type: SetType::Warmup },
                    SetInput { weight: Some(140), reps: 3, set_type: SetType::Working },
                ],
            },
            ExerciseInput {
                name: "Row".into(),
                sets: vec![SetInput { weight: None, reps: 10, set_type: SetType::Working }],
            },
        ];
        let ids = BTreeMap::from([("Squat".to_string(), 1), ("Row".to_string(), 2)]);
        let placed: Vec<(i64, i32)> = placed_sets(&exercises, &ids).map(|(id, s)| (id, s.reps)).collect();
        assert_eq!(placed, vec![(1, 5), (1, 3), (2, 10)]);
    }
}
