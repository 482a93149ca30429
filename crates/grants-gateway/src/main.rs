mod categories;
mod config;
mod diagnostics;
mod error;
mod gateway;
mod model;
mod normalize;
mod rate_limit;
mod server;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grants_common::simpler_grants::{SimplerGrantsClient, API_KEY_ENV};
use grants_common::usaspending::UsaSpendingClient;

use config::GatewayConfig;
use gateway::SearchGateway;
use normalize::{Normalizer, NormalizerConfig};
use rate_limit::RateLimiter;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting grants-gateway");

    let config = GatewayConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        primary = %config.primary.base_url,
        fallback = %config.fallback.base_url,
        primary_configured = config.primary.api_key.is_some(),
        max_page_size = config.max_page_size,
        rate_limit_rps = ?config.rate_limit_rps,
        "configuration loaded"
    );
    if config.primary.api_key.is_none() {
        warn!(var = API_KEY_ENV, "primary credential missing, searches will use the fallback API");
    }

    let primary = SimplerGrantsClient::new(config.primary.clone())?;
    let fallback = UsaSpendingClient::new(config.fallback.clone())?;
    let gateway = Arc::new(SearchGateway::new(
        primary,
        fallback,
        Normalizer::new(NormalizerConfig::default()),
    ));

    let state = AppState {
        gateway,
        limiter: RateLimiter::from_rps(config.rate_limit_rps),
        max_page_size: config.max_page_size,
    };
    let app = server::router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(address = %config.bind_addr, "HTTP server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    info!("HTTP server shut down");
    Ok(())
}
