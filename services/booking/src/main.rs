use anyhow::Result;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod calendar;
mod error;
mod ledger;
mod middleware;
mod models;
mod notifier;
mod repositories;
mod routes;
mod state;
mod sweep;

use crate::ledger::ReservationLedger;
use crate::middleware::AccessTokenVerifier;
use crate::notifier::LogNotifier;
use crate::repositories::{
    AuditRepository, ReservationRepository, SettingsRepository, TradeRepository, UserRepository,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting booking service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let verifier = AccessTokenVerifier::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let reservations = ReservationRepository::new(pool.clone());
    let users = UserRepository::new(pool.clone());
    let settings = SettingsRepository::new(pool.clone());
    let trades = TradeRepository::new(pool.clone());
    let audit = AuditRepository::new(pool.clone());

    let ledger = ReservationLedger::new(
        reservations,
        users.clone(),
        settings.clone(),
        trades,
        audit.clone(),
        Arc::new(LogNotifier),
    );

    // Daily sweep that marks past reservations completed
    let sweep_schedule =
        std::env::var("COMPLETION_SWEEP_SCHEDULE").unwrap_or_else(|_| "0 30 0 * * *".to_string());
    sweep::start_sweep_job(ledger.clone(), &sweep_schedule).await?;

    let app_state = AppState {
        ledger,
        users,
        settings,
        audit,
        verifier,
    };

    info!("Booking service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    info!("Booking service listening on 0.0.0.0:3001");

    axum::serve(listener, app).await?;

    Ok(())
}
