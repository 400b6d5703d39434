//! Warehouse OAuth Client
//!
//! Single-binary service that:
//! 1. Sends the user through the provider's authorization-code login
//! 2. Exchanges the code and keeps the token set on local disk
//! 3. Refreshes the access token before it expires
//! 4. Runs warehouse statements with the user's access token

mod config;
mod error;
mod metrics;
mod routes;
mod warehouse;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oauth_client::{ClientCredentials, FileTokenStore, TokenClient, build_http_client};
use token_session::ValidTokenAccessor;

use crate::config::Config;
use crate::routes::{SessionState, build_session_router};
use crate::warehouse::WarehouseClient;

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the operational endpoints
#[derive(Clone)]
struct AppState {
    session: SessionState,
    prometheus: PrometheusHandle,
    started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit covers every route, including the token endpoint
/// and warehouse calls the session routes make on the caller's behalf.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let session = build_session_router(state.session.clone());
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(session)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting warehouse-oauth-client");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let profile = config
        .provider
        .clone()
        .build()
        .context("invalid provider profile")?;
    let client_secret = config
        .client
        .client_secret
        .clone()
        .context("client secret missing after config load")?;

    info!(
        listen_addr = %config.server.listen_addr,
        provider = profile.id(),
        token_path = %config.tokens.path.display(),
        expiry_buffer_secs = config.tokens.expiry_buffer_secs,
        warehouse = %config.warehouse.base_url(),
        "configuration loaded"
    );

    let http = build_http_client(Duration::from_secs(config.tokens.request_timeout_secs))
        .context("failed to build HTTP client")?;

    let credentials = ClientCredentials::new(
        config.client.client_id.clone(),
        client_secret,
        config.client.redirect_uri.clone(),
    );
    let store = Arc::new(FileTokenStore::new(config.tokens.path.clone()));
    let token_client = Arc::new(TokenClient::new(http.clone(), profile, credentials, store));
    let accessor = Arc::new(ValidTokenAccessor::new(
        token_client,
        config.tokens.expiry_buffer_secs,
    ));

    let app_state = AppState {
        session: SessionState::new(accessor, WarehouseClient::new(http, &config.warehouse)),
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: signal the server to drain, then race it against the
    // timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: process uptime and session summary. Never includes tokens.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.accessor.status().await;
    let body = serde_json::json!({
        "status": "healthy",
        "provider": state.session.client.profile().id(),
        "session": session,
        "pending_logins": state.session.pending.len().await,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
