use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pitch_booking_backend::{
    build_router, config::Config, db, routes::accounts::ensure_bootstrap_chairman,
    NOTIFICATION_CHANNEL_SIZE,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env());

    let pool = db::connect(&config.database_url).await?;
    ensure_bootstrap_chairman(&pool, &config).await?;

    let (tx, _rx) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
    let app = build_router(pool, config.clone(), tx);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Started server on {}.", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
