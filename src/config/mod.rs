use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Role created by the initial migration
pub const DEFAULT_APP_ROLE: &str = "liftlog_app";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
    /// Role assumed for the duration of each unit of work. Row-level
    /// security does not apply to superusers, so this must name a role
    /// without BYPASSRLS. `None` runs as the connecting user.
    pub app_role: Option<String>,
    pub max_conflict_retries: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        let db = &mut self.database;
        override_from_env("DATABASE_MAX_CONNECTIONS", &mut db.max_connections);
        override_from_env("DATABASE_CONNECTION_TIMEOUT", &mut db.connection_timeout);
        override_from_env("DATABASE_MAX_CONFLICT_RETRIES", &mut db.max_conflict_retries);
        override_from_env("DATABASE_RUN_MIGRATIONS", &mut db.run_migrations);
        // An empty value disables the role switch
        if let Ok(v) = env::var("DATABASE_APP_ROLE") {
            let v = v.trim();
            db.app_role = (!v.is_empty()).then(|| v.to_string());
        }

        let api = &mut self.api;
        override_from_env("PORT", &mut api.port);
        override_from_env("LIFTLOG_API_PORT", &mut api.port);
        override_from_env("API_ENABLE_REQUEST_LOGGING", &mut api.enable_request_logging);
        override_from_env("API_MAX_REQUEST_SIZE_BYTES", &mut api.max_request_size_bytes);

        let security = &mut self.security;
        override_from_env("SECURITY_ENABLE_CORS", &mut security.enable_cors);
        override_from_env("SECURITY_JWT_EXPIRY_HOURS", &mut security.jwt_expiry_hours);
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            security.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            security.jwt_secret = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                app_role: Some(DEFAULT_APP_ROLE.to_string()),
                max_conflict_retries: 3,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 2 * 1024 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "liftlog-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7,
            },
        }
    }

    /// Development settings with a larger pool and no built-in secret
    fn staging() -> Self {
        let base = Self::development();
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                ..base.database
            },
            api: ApiConfig {
                max_request_size_bytes: 1024 * 1024,
                ..base.api
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                ..base.security
            },
        }
    }

    /// Migrations run out of band in production
    fn production() -> Self {
        let base = Self::staging();
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                max_conflict_retries: 5,
                run_migrations: false,
                ..base.database
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 512 * 1024,
                ..base.api
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_expiry_hours: 4,
                ..base.security
            },
        }
    }
}

/// Replace `target` with the parsed value of `key`. Unparseable values are
/// ignored with a warning so a typo cannot take the service down.
fn override_from_env<T: FromStr>(key: &str, target: &mut T) {
    let Ok(raw) = env::var(key) else { return };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("Ignoring unparseable {}='{}'", key, raw),
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
