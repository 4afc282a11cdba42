pub mod exercises;
pub mod health;
pub mod workouts;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::{DatabaseManager, TenantBinder};
use crate::middleware::jwt_auth_middleware;
use crate::services::WorkoutService;

/// Shared handler state. `config` is the single configuration the router,
/// the auth layer and the tenant binder are built from.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: DatabaseManager,
    pub workouts: WorkoutService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(database: DatabaseManager, config: AppConfig) -> Self {
        let binder = TenantBinder::new(&database, &config.database);
        Self {
            jwt_secret: Arc::from(config.security.jwt_secret.as_str()),
            config: Arc::new(config),
            database,
            workouts: WorkoutService::new(binder),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    let router = Router::new()
        // Public
        .route("/health", get(health::health))
        // Tenant-scoped API
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config));

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/workouts", post(workouts::create))
        .route(
            "/api/workouts/:id",
            get(workouts::get).put(workouts::update).delete(workouts::delete),
        )
        .route("/api/exercises/:id", get(exercises::get))
        .route("/api/exercises/:id/personal-record", put(exercises::set_personal_record))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
