use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use liftlog_api::auth::{generate_jwt, Claims};
use liftlog_api::config;
use liftlog_api::database::DatabaseManager;
use liftlog_api::handlers::{app, AppState};
use liftlog_api::types::TenantId;

#[derive(Parser)]
#[command(name = "liftlog-api")]
#[command(about = "Multi-tenant workout tracking API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on, overrides LIFTLOG_API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,

    #[command(about = "Issue a bearer token for a tenant")]
    Token {
        tenant: String,
        #[arg(long, help = "Lifetime in hours, defaults to the configured expiry")]
        hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(port).await,
        Command::Migrate => {
            let database = DatabaseManager::connect(&config::config().database).await?;
            database.migrate().await?;
            database.close().await;
            Ok(())
        }
        Command::Token { tenant, hours } => {
            let security = &config::config().security;
            let tenant = TenantId::parse(tenant)?;
            let claims = Claims::new(&tenant, hours.unwrap_or(security.jwt_expiry_hours));
            println!("{}", generate_jwt(&claims, &security.jwt_secret)?);
            Ok(())
        }
    }
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting LiftLog API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let database = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    if config.database.run_migrations {
        database.migrate().await.context("failed to apply migrations")?;
    }
    if config.database.app_role.is_none() {
        tracing::warn!("No application role configured; row-level security depends on the connecting user");
    }

    let router = app(AppState::new(database.clone(), config.clone()));

    let bind_addr = format!("0.0.0.0:{}", port.unwrap_or(config.api.port));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("LiftLog API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    database.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
