use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth_backend_core::{
    build_router, initialize_app_state, AppConfig, RouterOptions, UnavailableController,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle OTP rate-limit keys are dropped
const OTP_LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on waiting for in-flight security log writes at shutdown
const SECURITY_LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_backend_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Starting auth backend on {} ({})",
        config.server.bind_address, config.server.environment
    );

    let state = initialize_app_state(&config, Arc::new(UnavailableController))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize application state: {}", e))?;

    let limiter = state.otp_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(OTP_LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let security_logger = state.security_logger.clone();
    let app = build_router(state, &RouterOptions::from(&config));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Auth routes mounted under {}", config.server.auth_route_prefix);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    let pending = security_logger.pending();
    if pending > 0 {
        info!("Waiting for {} security log writes", pending);
    }
    if tokio::time::timeout(SECURITY_LOG_DRAIN_TIMEOUT, security_logger.drain())
        .await
        .is_err()
    {
        tracing::warn!(
            "Gave up on {} security log writes after {:?}",
            security_logger.pending(),
            SECURITY_LOG_DRAIN_TIMEOUT
        );
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
