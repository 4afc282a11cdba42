mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use liftlog_api::auth::{generate_jwt, Claims};
use liftlog_api::handlers::{app, AppState};
use liftlog_api::types::TenantId;

const SECRET: &str = "http-test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Serve the real router on a free local port
async fn spawn_server() -> Result<Option<TestServer>> {
    let Some(db) = common::setup().await? else { return Ok(None) };

    let mut config = db.config.clone();
    config.security.jwt_secret = SECRET.to_string();
    config.api.enable_request_logging = false;

    let port = portpicker::pick_unused_port().context("no free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let router = app(AppState::new(db.database.clone(), config));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("test server stopped: {}", e);
        }
    });

    Ok(Some(TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }))
}

fn bearer(tenant: &TenantId) -> Result<String> {
    Ok(format!("Bearer {}", generate_jwt(&Claims::new(tenant, 1), SECRET)?))
}

fn bench_workout(weight: i32, reps: i32) -> Value {
    json!({
        "date": "2025-03-01",
        "focus": "push",
        "exercises": [
            { "name": "Bench Press", "sets": [
                { "weight": 60, "reps": 10, "set_type": "warmup" },
                { "weight": weight, "reps": reps }
            ]}
        ]
    })
}

#[tokio::test]
async fn health_reports_database_status() -> Result<()> {
    let Some(server) = spawn_server().await? else { return Ok(()) };

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn workout_lifecycle_over_http() -> Result<()> {
    let Some(server) = spawn_server().await? else { return Ok(()) };
    let auth = bearer(&common::tenant("http"))?;

    let res = server
        .client
        .post(server.url("/api/workouts"))
        .header("Authorization", &auth)
        .json(&bench_workout(200, 1))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    let workout_id = body["data"]["id"].as_i64().context("workout id")?;

    let res = server
        .client
        .get(server.url(&format!("/api/workouts/{}", workout_id)))
        .header("Authorization", &auth)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let exercise = &body["data"]["exercises"][0];
    assert_eq!(exercise["name"], "Bench Press");
    assert_eq!(exercise["sets"][0]["set_type"], "warmup");
    assert_eq!(exercise["sets"][1]["set_type"], "working");
    let exercise_id = exercise["exercise_id"].as_i64().context("exercise id")?;
    let exercise_url = server.url(&format!("/api/exercises/{}", exercise_id));

    let body: Value = server
        .client
        .get(&exercise_url)
        .header("Authorization", &auth)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"]["best_value"], "206.67");
    assert_eq!(body["data"]["best_value_source_workout_id"], workout_id);

    let res = server
        .client
        .put(server.url(&format!("/api/workouts/{}", workout_id)))
        .header("Authorization", &auth)
        .json(&bench_workout(100, 1))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = server
        .client
        .get(&exercise_url)
        .header("Authorization", &auth)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"]["best_value"], "103.33");

    let res = server
        .client
        .delete(server.url(&format!("/api/workouts/{}", workout_id)))
        .header("Authorization", &auth)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server
        .client
        .get(server.url(&format!("/api/workouts/{}", workout_id)))
        .header("Authorization", &auth)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn personal_record_override_over_http() -> Result<()> {
    let Some(server) = spawn_server().await? else { return Ok(()) };
    let auth = bearer(&common::tenant("http-pin"))?;

    let body: Value = server
        .client
        .post(server.url("/api/workouts"))
        .header("Authorization", &auth)
        .json(&bench_workout(200, 1))
        .send()
        .await?
        .json()
        .await?;
    let workout_id = body["data"]["id"].as_i64().context("workout id")?;

    let body: Value = server
        .client
        .get(server.url(&format!("/api/workouts/{}", workout_id)))
        .header("Authorization", &auth)
        .send()
        .await?
        .json()
        .await?;
    let exercise_id = body["data"]["exercises"][0]["exercise_id"].as_i64().context("exercise id")?;
    let pin_url = server.url(&format!("/api/exercises/{}/personal-record", exercise_id));

    let res = server
        .client
        .put(&pin_url)
        .header("Authorization", &auth)
        .json(&json!({ "mode": "manual", "value": "250" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["state"], "cached");
    assert_eq!(body["data"]["source"], Value::Null);

    let res = server
        .client
        .put(&pin_url)
        .header("Authorization", &auth)
        .json(&json!({ "mode": "recompute" }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["value"], "206.67");
    assert_eq!(body["data"]["source"], workout_id);

    let res = server
        .client
        .put(&pin_url)
        .header("Authorization", &auth)
        .json(&json!({ "mode": "guess" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // Another tenant cannot see or pin the exercise
    let stranger = bearer(&common::tenant("http-stranger"))?;
    let res = server
        .client
        .put(&pin_url)
        .header("Authorization", &stranger)
        .json(&json!({ "mode": "manual", "value": "1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn invalid_sets_are_rejected() -> Result<()> {
    let Some(server) = spawn_server().await? else { return Ok(()) };
    let auth = bearer(&common::tenant("http-invalid"))?;

    let res = server
        .client
        .post(server.url("/api/workouts"))
        .header("Authorization", &auth)
        .json(&bench_workout(-5, 3))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}
