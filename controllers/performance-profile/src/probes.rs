//! HTTP endpoints for health checks and Prometheus metrics

use crate::error::ControllerError;
use crate::metrics::ControllerMetrics;
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state of the probe server
#[derive(Debug, Clone)]
pub struct ProbeState {
    ready: Arc<AtomicBool>,
    metrics: Arc<ControllerMetrics>,
}

impl ProbeState {
    pub fn new(metrics: Arc<ControllerMetrics>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    /// Flip readiness once the controller is watching
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics(State(state): State<ProbeState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.registry().gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the probe router
pub fn create_router(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve probes on `addr` until the listener fails
pub async fn serve(addr: SocketAddr, state: ProbeState) -> Result<(), ControllerError> {
    let app = create_router(state);

    info!(addr = %addr, "Starting probe server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Server(format!("failed to bind {addr}: {e}")))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ControllerError::Server(e.to_string()))
}
