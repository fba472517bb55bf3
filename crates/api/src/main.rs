use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_api::config::Settings;
use atelier_api::router::build_router;
use atelier_api::state::AppState;
use atelier_client::RenderApi;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = Settings::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Composition root ---
    let client = Arc::new(RenderApi::new(config.render_api_url.clone()));
    tracing::info!(render_api_url = %config.render_api_url, "Render service client created");

    let state = AppState::new(config, client).expect("Invalid configuration");
    let shutdown = state.shutdown.clone();
    let watches = Arc::clone(&state.watches);

    // --- HTTP server ---
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .expect("Invalid HOST/PORT combination");
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            // Interrupt in-flight polls, then stop every watch loop.
            shutdown.cancel();
            watches.shutdown().await;
        })
        .await
        .expect("Server error");

    tracing::info!("Shutdown complete");
}
