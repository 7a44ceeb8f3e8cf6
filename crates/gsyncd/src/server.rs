//! Daemon lifecycle: storage, identity, HTTP server, metrics listener

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use gsync_core::config::GsyncConfig;
use gsync_crypto::ReencryptionBridge;
use gsync_store::{build_operator, check_health, DocumentStore};
use secrecy::SecretString;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::identity::{IdentityVerifier, JwtVerifier};
use crate::metrics::{HealthState, Metrics};
use crate::routes;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: ReencryptionBridge,
    pub documents: DocumentStore,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub metrics: Arc<Metrics>,
    /// Enables `POST /api/mobile/grades/test-decrypt`
    pub diagnostics: bool,
}

/// Build the axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::sync_routes())
        .merge(routes::bridge_routes())
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: GsyncConfig, jwt_secret: SecretString) -> Result<()> {
    info!("daemon starting");

    let bridge = ReencryptionBridge::from_config(&config.crypto)
        .context("invalid [crypto] configuration")?;
    info!(
        pbkdf2_iterations = bridge.web().iterations(),
        mobile_key_scheme = ?bridge.mobile().scheme(),
        "ciphers configured"
    );

    // ── Document store ───────────────────────────────────────────────────
    let operator = build_operator(&config.storage)?;
    match check_health(&operator).await {
        Ok(()) => info!(backend = ?config.storage.backend, "document store: connected"),
        Err(e) => warn!(backend = ?config.storage.backend, "document store: {e}"),
    }

    let metrics = Arc::new(Metrics::new());
    let state = AppState {
        bridge,
        documents: DocumentStore::new(operator.clone()),
        verifier: Arc::new(JwtVerifier::new(&jwt_secret, &config.auth)),
        metrics: metrics.clone(),
        diagnostics: config.server.diagnostics,
    };
    if state.diagnostics {
        warn!("diagnostics enabled: test-decrypt endpoint is exposed");
    }

    let health = HealthState {
        metrics,
        operator,
    };

    // ── Metrics listener ─────────────────────────────────────────────────
    // with no dedicated address, /metrics is served on the main listener
    let app = match config.server.metrics_addr.clone() {
        Some(addr) => {
            tokio::spawn(async move {
                if let Err(e) = crate::metrics::serve(addr, health).await {
                    error!("metrics server failed: {e}");
                }
            });
            build_app(state)
        }
        None => build_app(state).merge(crate::metrics::routes(health)),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding {}", config.server.listen))?;
    info!(addr = %config.server.listen, "gsyncd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
