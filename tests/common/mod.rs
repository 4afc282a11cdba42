#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use liftlog_api::config::AppConfig;
use liftlog_api::database::{DatabaseManager, TenantBinder};
use liftlog_api::services::WorkoutService;
use liftlog_api::types::{ExerciseInput, SetInput, SetType, TenantId, WorkoutInput};

static TENANT_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct TestDb {
    pub config: AppConfig,
    pub database: DatabaseManager,
    pub binder: TenantBinder,
    pub service: WorkoutService,
}

/// Connect to `DATABASE_URL` and apply migrations. `None` when no database
/// is configured, in which case the calling test returns early.
pub async fn setup() -> Result<Option<TestDb>> {
    let _ = dotenvy::dotenv();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping database test");
        return Ok(None);
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let config = AppConfig::from_env();
    let database = DatabaseManager::connect(&config.database).await?;
    database.migrate().await?;

    let binder = TenantBinder::new(&database, &config.database);
    let service = WorkoutService::new(binder.clone());
    Ok(Some(TestDb {
        config,
        database,
        binder,
        service,
    }))
}

/// A tenant id no other test run uses
pub fn tenant(label: &str) -> TenantId {
    let seq = TENANT_SEQ.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    TenantId::parse(format!("{}-{}-{}-{}", label, std::process::id(), nanos, seq)).unwrap()
}

pub fn working(weight: i32, reps: i32) -> SetInput {
    SetInput {
        weight: Some(weight),
        reps,
        set_type: SetType::Working,
    }
}

pub fn warmup(weight: i32, reps: i32) -> SetInput {
    SetInput {
        weight: Some(weight),
        reps,
        set_type: SetType::Warmup,
    }
}

pub fn workout(exercises: Vec<(&str, Vec<SetInput>)>) -> WorkoutInput {
    WorkoutInput {
        date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        notes: None,
        focus: Some("strength".to_string()),
        exercises: Some(
            exercises
                .into_iter()
                .map(|(name, sets)| ExerciseInput {
                    name: name.to_string(),
                    sets,
                })
                .collect(),
        ),
    }
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Id of the exercise called `name` in the workout
pub async fn exercise_id(db: &TestDb, tenant: &TenantId, workout_id: i64, name: &str) -> Result<i64> {
    let detail = db.service.get_workout(tenant, workout_id).await?;
    detail
        .exercises
        .iter()
        .find(|e| e.name == name)
        .map(|e| e.exercise_id)
        .ok_or_else(|| anyhow::anyhow!("exercise '{}' not in workout {}", name, workout_id))
}

/// `(best_value, best_value_source_workout_id)` of an exercise
pub async fn record(db: &TestDb, tenant: &TenantId, exercise_id: i64) -> Result<(Option<Decimal>, Option<i64>)> {
    let exercise = db.service.get_exercise(tenant, exercise_id).await?;
    Ok((exercise.best_value, exercise.best_value_source_workout_id))
}
