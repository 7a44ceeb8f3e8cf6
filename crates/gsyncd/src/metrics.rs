//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  Prometheus text format
//!   GET /healthz  liveness, always 200 while the process runs
//!   GET /readyz   readiness, 200 if the document store is reachable

use std::sync::Arc;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub op: String,
    pub outcome: String,
}

/// Request counters for the bridge and sync endpoints.
pub struct Metrics {
    registry: Registry,
    bridge_requests: Family<RequestLabels, Counter>,
    sync_requests: Family<RequestLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let bridge_requests = Family::<RequestLabels, Counter>::default();
        let sync_requests = Family::<RequestLabels, Counter>::default();

        // the text encoder appends `_total` to counters
        registry.register(
            "gsync_bridge_requests",
            "Re-encryption bridge requests by direction and outcome",
            bridge_requests.clone(),
        );
        registry.register(
            "gsync_sync_requests",
            "Mobile sync requests by operation and outcome",
            sync_requests.clone(),
        );

        Self {
            registry,
            bridge_requests,
            sync_requests,
        }
    }

    pub fn record_bridge(&self, op: &str, outcome: &str) {
        self.bridge_requests
            .get_or_create(&RequestLabels {
                op: op.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_sync(&self, op: &str, outcome: &str) {
        self.sync_requests
            .get_or_create(&RequestLabels {
                op: op.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn encode_text(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

/// Shared state for the metrics and probe endpoints
#[derive(Clone)]
pub struct HealthState {
    pub metrics: Arc<Metrics>,
    pub operator: opendal::Operator,
}

pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Serve metrics and probes on their own listener (e.g. "127.0.0.1:9187")
pub async fn serve(addr: String, state: HealthState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, routes(state))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 if the document store is reachable, 503 otherwise.
async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    if gsync_store::is_healthy(&state.operator).await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "document store unreachable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_path(app: Router, path: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_probe_routes() {
        let metrics = Arc::new(Metrics::new());
        metrics.record_sync("encrypt", "ok");
        let app = routes(HealthState {
            metrics,
            operator: gsync_store::operator::build_memory_operator().unwrap(),
        });

        assert_eq!(get_path(app.clone(), "/healthz").await, (StatusCode::OK, "ok".into()));
        assert_eq!(get_path(app.clone(), "/readyz").await, (StatusCode::OK, "ready".into()));

        let (status, body) = get_path(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"gsync_sync_requests_total{op="encrypt",outcome="ok"} 1"#));
    }

    #[test]
    fn test_counters_encode_with_total_suffix() {
        let m = Metrics::new();
        m.record_bridge("web_to_mobile", "ok");
        m.record_bridge("web_to_mobile", "ok");
        m.record_sync("decrypt", "decryption_error");

        let text = m.encode_text().unwrap();
        assert!(text.contains(
            r#"gsync_bridge_requests_total{op="web_to_mobile",outcome="ok"} 2"#
        ));
        assert!(text.contains(
            r#"gsync_sync_requests_total{op="decrypt",outcome="decryption_error"} 1"#
        ));
    }
}
