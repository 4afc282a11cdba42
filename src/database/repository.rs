//! Tenant-scoped queries. None of them filter on `tenant_id`: visibility is
//! the row-level security policies' job, and a row outside the scope simply
//! does not come back. Inserts still carry the tenant id, which the policies
//! check against the bound setting.

use rust_decimal::Decimal;

use crate::database::manager::{DatabaseError, QueryContext};
use crate::database::models::{Exercise, LockedRecord, Workout, WorkoutSetRow};
use crate::database::tenant_scope::TenantScope;
use crate::records::state::{RecordState, WorkingSet};
use crate::types::{SetInput, WorkoutInput};

/// Ordering of a set within its workout
#[derive(Debug, Clone, Copy)]
pub struct SetPosition {
    pub exercise_order: i32,
    pub set_order: i32,
}

impl TenantScope {
    // Workouts

    pub async fn insert_workout(&mut self, input: &WorkoutInput) -> Result<i64, DatabaseError> {
        let tenant = self.tenant().as_str().to_string();
        sqlx::query_scalar(
            "INSERT INTO workouts (tenant_id, date, notes, focus) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(tenant)
        .bind(input.date)
        .bind(&input.notes)
        .bind(&input.focus)
        .fetch_one(self.conn())
        .await
        .context("insert workout")
    }

    /// Lock a workout row for the rest of the unit of work. `false` when the
    /// workout is not visible in this scope.
    pub async fn lock_workout(&mut self, workout_id: i64) -> Result<bool, DatabaseError> {
        let row: Option<i64> = sqlx::query_scalar("SELECT id FROM workouts WHERE id = $1 FOR UPDATE")
            .bind(workout_id)
            .fetch_optional(self.conn())
            .await
            .context("lock workout")?;
        Ok(row.is_some())
    }

    pub async fn update_workout(&mut self, workout_id: i64, input: &WorkoutInput) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE workouts SET date = $2, notes = $3, focus = $4, updated_at = now() WHERE id = $1",
        )
        .bind(workout_id)
        .bind(input.date)
        .bind(&input.notes)
        .bind(&input.focus)
        .execute(self.conn())
        .await
        .context("update workout")?;
        Ok(result.rows_affected())
    }

    /// Delete a workout; its sets go with it by cascade
    pub async fn delete_workout(&mut self, workout_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM workouts WHERE id = $1")
            .bind(workout_id)
            .execute(self.conn())
            .await
            .context("delete workout")?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_workout(&mut self, workout_id: i64) -> Result<Option<Workout>, DatabaseError> {
        sqlx::query_as::<_, Workout>("SELECT id, tenant_id, date, notes, focus FROM workouts WHERE id = $1")
            .bind(workout_id)
            .fetch_optional(self.conn())
            .await
            .context("fetch workout")
    }

    // Sets

    pub async fn fetch_workout_sets(&mut self, workout_id: i64) -> Result<Vec<WorkoutSetRow>, DatabaseError> {
        sqlx::query_as::<_, WorkoutSetRow>(
            r#"
            SELECT s.id, s.exercise_id, e.name AS exercise_name, s.weight, s.reps,
                   s.set_type, s.exercise_order, s.set_order
            FROM workout_sets s
            JOIN exercises e ON e.id = s.exercise_id
            WHERE s.workout_id = $1
            ORDER BY s.exercise_order, s.set_order
            "#,
        )
        .bind(workout_id)
        .fetch_all(self.conn())
        .await
        .context("fetch workout sets")
    }

    /// Exercises referenced by any set of the workout
    pub async fn workout_exercise_ids(&mut self, workout_id: i64) -> Result<Vec<i64>, DatabaseError> {
        sqlx::query_scalar("SELECT DISTINCT exercise_id FROM workout_sets WHERE workout_id = $1")
            .bind(workout_id)
            .fetch_all(self.conn())
            .await
            .context("list workout exercises")
    }

    pub async fn delete_workout_sets(&mut self, workout_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM workout_sets WHERE workout_id = $1")
            .bind(workout_id)
            .execute(self.conn())
            .await
            .context("delete workout sets")?;
        Ok(result.rows_affected())
    }

    pub async fn insert_set(
        &mut self,
        workout_id: i64,
        exercise_id: i64,
        set: &SetInput,
        position: SetPosition,
    ) -> Result<(), DatabaseError> {
        let tenant = self.tenant().as_str().to_string();
        sqlx::query(
            r#"
            INSERT INTO workout_sets
                (tenant_id, workout_id, exercise_id, weight, reps, set_type, exercise_order, set_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tenant)
        .bind(workout_id)
        .bind(exercise_id)
        .bind(set.weight)
        .bind(set.reps)
        .bind(set.set_type.as_str())
        .bind(position.exercise_order)
        .bind(position.set_order)
        .execute(self.conn())
        .await
        .context("insert set")?;
        Ok(())
    }

    /// Every working set of an exercise across the tenant's workouts,
    /// optionally ignoring one workout
    pub async fn working_sets(
        &mut self,
        exercise_id: i64,
        exclude_workout: Option<i64>,
    ) -> Result<Vec<WorkingSet>, DatabaseError> {
        sqlx::query_as::<_, WorkingSet>(
            r#"
            SELECT workout_id, weight, reps
            FROM workout_sets
            WHERE exercise_id = $1
              AND set_type = 'working'
              AND ($2::BIGINT IS NULL OR workout_id <> $2)
            "#,
        )
        .bind(exercise_id)
        .bind(exclude_workout)
        .fetch_all(self.conn())
        .await
        .context("scan working sets")
    }

    // Exercises

    /// Id of the tenant's exercise called exactly `name`, created if missing
    pub async fn get_or_create_exercise(&mut self, name: &str) -> Result<i64, DatabaseError> {
        let tenant = self.tenant().as_str().to_string();
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO exercises (tenant_id, name) VALUES ($1, $2)
            ON CONFLICT (tenant_id, name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(tenant)
        .bind(name)
        .fetch_optional(self.conn())
        .await
        .context("create exercise")?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        sqlx::query_scalar("SELECT id FROM exercises WHERE name = $1")
            .bind(name)
            .fetch_one(self.conn())
            .await
            .context("look up exercise")
    }

    pub async fn fetch_exercise(&mut self, exercise_id: i64) -> Result<Option<Exercise>, DatabaseError> {
        sqlx::query_as::<_, Exercise>(
            r#"
            SELECT id, tenant_id, name, best_value, best_value_source_workout_id
            FROM exercises WHERE id = $1
            "#,
        )
        .bind(exercise_id)
        .fetch_optional(self.conn())
        .await
        .context("fetch exercise")
    }

    /// Exercises whose cached record is credited to the workout
    pub async fn exercises_held_by(&mut self, workout_id: i64) -> Result<Vec<i64>, DatabaseError> {
        sqlx::query_scalar("SELECT id FROM exercises WHERE best_value_source_workout_id = $1")
            .bind(workout_id)
            .fetch_all(self.conn())
            .await
            .context("find record holders")
    }

    /// Lock exercise rows in ascending id order and return their cache
    /// state. Ids outside the scope are silently absent from the result.
    ///
    /// `NO KEY UPDATE` serializes record writers without blocking the
    /// foreign-key checks of concurrent set inserts.
    pub async fn lock_records(&mut self, exercise_ids: &[i64]) -> Result<Vec<LockedRecord>, DatabaseError> {
        if exercise_ids.is_empty() {
            return Ok(vec![]);
        }
        sqlx::query_as::<_, LockedRecord>(
            r#"
            SELECT id, best_value, best_value_source_workout_id
            FROM exercises
            WHERE id = ANY($1)
            ORDER BY id
            FOR NO KEY UPDATE
            "#,
        )
        .bind(exercise_ids)
        .fetch_all(self.conn())
        .await
        .context("lock exercise records")
    }

    pub async fn write_record(&mut self, exercise_id: i64, state: &RecordState) -> Result<(), DatabaseError> {
        let (value, source): (Option<Decimal>, Option<i64>) = state.columns();
        sqlx::query(
            r#"
            UPDATE exercises
            SET best_value = $2, best_value_source_workout_id = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(exercise_id)
        .bind(value)
        .bind(source)
        .execute(self.conn())
        .await
        .context("write exercise record")?;
        Ok(())
    }
}
