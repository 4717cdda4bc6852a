//! Livedesk relay server entry point

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use livedesk_relay::{routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = livedesk_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;

    livedesk_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, pool);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "Livedesk relay listening");

    axum::serve(listener, router)
        .await
        .context("Server error")?;

    Ok(())
}
