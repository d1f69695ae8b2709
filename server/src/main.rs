//! Authgate Server - Main Entry Point
//!
//! Rate-limited authentication endpoints backed by a shared Redis store.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use authgate_server::{
    api, config,
    ratelimit::{RateLimitConfig, RateLimiter, RedisCounterStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authgate_server=info,tower_http=info".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;
    let rl_config = RateLimitConfig::from_env().context("Invalid rate limit configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %rl_config.environment,
        "Starting Authgate Server"
    );

    if !rl_config.enabled {
        warn!(
            environment = %rl_config.environment,
            "Rate limiting disabled by configuration; authentication endpoints are unprotected"
        );
    }

    // Initialize the shared counter store; without it nothing can be admitted
    let store = RedisCounterStore::connect(&config.redis_url, rl_config.store_timeout)
        .await
        .context("Failed to initialize Redis counter store")?;
    let rate_limiter = RateLimiter::new(Arc::new(store), rl_config);
    info!("Rate limiter initialized");

    // Build application state
    let state = api::AppState::new(config.clone(), rate_limiter);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Server shutdown complete");

    Ok(())
}
