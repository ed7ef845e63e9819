mod analysis;
mod config;
mod errors;
mod inference_client;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::semantic::SemanticVerifier;
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Skillproof API v{}", env!("CARGO_PKG_VERSION"));

    // Choose the semantic backend once; a failed probe pins the lexical path
    let verifier = SemanticVerifier::initialize(&config.backend_settings()).await;
    info!(
        "Semantic verifier ready (active: {}, model: {})",
        verifier.capability().active,
        verifier.model_name()
    );

    let settings = config.analysis_settings();
    info!(
        "Scoring: {} / no-match: {} / context radius {} / footer ratio {}",
        settings.scoring_policy,
        settings.no_match_policy,
        settings.context_radius,
        settings.thresholds.footer_ratio
    );

    let state = AppState::new(config.clone(), verifier);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config.cors_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive when `*` is among the origins, otherwise an explicit allow-list.
fn build_cors(origins: &[String]) -> Result<CorsLayer> {
    if origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("CORS origin '{o}' is not a valid header value"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any))
}
