use anyhow::Result;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod error;
mod jwt;
mod models;
mod prune;
mod repositories;
mod routes;
mod session;

use crate::jwt::{JwtConfig, JwtService};
use crate::repositories::{BlacklistRepository, UserRepository};
use crate::session::SessionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session_manager: SessionManager,
    pub access_token_expiry: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize JWT service
    let jwt_config = JwtConfig::from_env()?;
    let access_token_expiry = jwt_config.access_token_expiry;
    let jwt_service = JwtService::new(jwt_config);

    let user_repository = UserRepository::new(pool.clone());
    let blacklist_repository = BlacklistRepository::new(pool.clone());

    let session_manager = SessionManager::new(
        jwt_service,
        Arc::new(user_repository),
        Arc::new(blacklist_repository.clone()),
    );

    // Daily sweep of expired blacklist entries
    let prune_schedule = std::env::var("BLACKLIST_PRUNE_SCHEDULE")
        .unwrap_or_else(|_| "0 0 3 * * *".to_string());
    prune::start_prune_job(blacklist_repository, &prune_schedule).await?;

    let app_state = AppState {
        session_manager,
        access_token_expiry,
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Authentication service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
