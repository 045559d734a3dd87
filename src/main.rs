use std::sync::Arc;

use anyhow::Result;
use axum::routing::{any, get};
use axum::Router;
use dotenvy::dotenv;
use tower_http::trace::TraceLayer;
use tracing::info;

mod config;
mod handlers;
mod llm;
mod prompts;
mod state;
mod utils;

use config::Config;
use llm::GeminiClient;
use state::AppState;
use utils::logging::init_logging;

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/api/analyze-ad", any(handlers::analyze::analyze_ad))
        .route("/api/uploadthing", any(handlers::upload::uploadthing_relay))
        .route(
            "/api/uploadthing/{*path}",
            any(handlers::upload::uploadthing_relay),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown signal handler: {err}");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level);

    info!("Starting ad creative analysis service");
    if config.gemini_api_key.trim().is_empty() {
        tracing::warn!("GEMINI_API_KEY is not set; analysis requests will fail until it is configured");
    }

    let model = Arc::new(GeminiClient::from_config(&config));
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, model);

    let app = router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
