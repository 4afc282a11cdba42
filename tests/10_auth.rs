use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use liftlog_api::auth::{generate_jwt, Claims};
use liftlog_api::config::AppConfig;
use liftlog_api::database::DatabaseManager;
use liftlog_api::handlers::{app, AppState};
use liftlog_api::types::TenantId;

const SECRET: &str = "router-test-secret";

/// Router over a pool that never connects; requests rejected by the auth
/// layer must not reach the database.
fn router() -> Result<Router> {
    let mut config = AppConfig::from_env();
    config.security.jwt_secret = SECRET.to_string();
    config.api.enable_request_logging = false;
    config.database.connection_timeout = 1;

    let database = DatabaseManager::connect_lazy("postgres://127.0.0.1:1/liftlog_unreachable", &config.database)?;
    Ok(app(AppState::new(database, config)))
}

async fn send(router: Router, method: Method, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    let response = router.oneshot(builder.body(Body::empty())?).await?;

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, body))
}

fn assert_unauthorized(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::UNAUTHORIZED, "body: {}", body);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn missing_token_is_rejected() -> Result<()> {
    let (status, body) = send(router()?, Method::GET, "/api/workouts/1", None).await?;
    assert_unauthorized(status, &body);
    Ok(())
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() -> Result<()> {
    let (status, body) = send(router()?, Method::GET, "/api/exercises/1", Some("Basic dXNlcjpwYXNz")).await?;
    assert_unauthorized(status, &body);
    Ok(())
}

#[tokio::test]
async fn malformed_token_is_rejected() -> Result<()> {
    let (status, body) = send(router()?, Method::DELETE, "/api/workouts/1", Some("Bearer not-a-jwt")).await?;
    assert_unauthorized(status, &body);
    Ok(())
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() -> Result<()> {
    let tenant = TenantId::parse("acme")?;
    let token = generate_jwt(&Claims::new(&tenant, 1), "some-other-secret")?;

    let (status, body) = send(
        router()?,
        Method::GET,
        "/api/workouts/1",
        Some(&format!("Bearer {}", token)),
    )
    .await?;
    assert_unauthorized(status, &body);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected() -> Result<()> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "acme".to_string(),
        exp: now - 3600,
        iat: now - 7200,
    };
    let token = generate_jwt(&claims, SECRET)?;

    let (status, body) = send(
        router()?,
        Method::GET,
        "/api/exercises/1",
        Some(&format!("Bearer {}", token)),
    )
    .await?;
    assert_unauthorized(status, &body);
    Ok(())
}

#[tokio::test]
async fn token_without_valid_tenant_is_rejected() -> Result<()> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: String::new(),
        exp: now + 3600,
        iat: now,
    };
    let token = generate_jwt(&claims, SECRET)?;

    let (status, body) = send(
        router()?,
        Method::GET,
        "/api/workouts/1",
        Some(&format!("Bearer {}", token)),
    )
    .await?;
    assert_unauthorized(status, &body);
    Ok(())
}

#[tokio::test]
async fn token_signed_with_configured_secret_passes_auth() -> Result<()> {
    let tenant = TenantId::parse("acme")?;
    let token = generate_jwt(&Claims::new(&tenant, 1), SECRET)?;

    // Past the auth layer the unreachable database answers with a masked 500
    let (status, body) = send(
        router()?,
        Method::GET,
        "/api/workouts/1",
        Some(&format!("Bearer {}", token)),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {}", body);
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    let (status, _) = send(router()?, Method::GET, "/api/members", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
