use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use log::info;

use stride::api::{self, AppState};
use stride::core::Config;
use stride::database::SqliteStore;
use stride::features::dispatch::DiscordGateway;
use stride::features::reminders::SweepOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Stride reminder engine...");

    let store = Arc::new(SqliteStore::new(&config.database_path).await?);
    info!("📦 Schedule store ready at {}", config.database_path);

    let gateway = Arc::new(DiscordGateway::from_token(&config.discord_token));

    let orchestrator = SweepOrchestrator::new(
        store,
        gateway,
        config.habit_reminder_hour,
        config.dispatch_concurrency,
    );

    let state = Arc::new(AppState {
        orchestrator,
        sweep_auth_token: config.sweep_auth_token.clone(),
    });

    if state.sweep_auth_token.is_none() {
        info!("No SWEEP_AUTH_TOKEN configured - sweep endpoint is open (dev mode)");
    }

    // No in-process scheduler: sweeps run only when the external cron
    // trigger posts to /internal/sweep.
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!("📡 Sweep trigger listening on {}", config.http_bind_addr);

    axum::serve(listener, api::router(state)).await?;

    Ok(())
}
