//! HTTP server setup and graceful shutdown.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, in-flight tracking)
//! - Serve until told to stop, then drain
//! - Expose a `ServerHandle` the lifecycle controller can stop

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::future::BoxFuture;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ListenerConfig;
use crate::http::inflight::InFlightTracker;
use crate::lifecycle::shutdown::{GracefulServer, ShutdownError};
use crate::observability::metrics;

/// Where the server is in its own lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Serving,
    /// Told to stop; no new connections, in-flight requests finishing.
    Draining,
    Stopped,
    Failed(String),
}

impl ServerState {
    fn is_final(&self) -> bool {
        matches!(self, ServerState::Stopped | ServerState::Failed(_))
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub server_state: watch::Receiver<ServerState>,
    pub inflight: InFlightTracker,
    pub metrics: Option<PrometheusHandle>,
}

/// The HTTP server driven by the service lifecycle.
///
/// The running server owns the only state sender, so a handle can tell
/// a server that stopped from one whose task died.
pub struct HttpServer {
    router: Router,
    state_tx: watch::Sender<ServerState>,
    stop_rx: watch::Receiver<bool>,
}

impl HttpServer {
    /// Create the server and the handle used to stop it.
    pub fn new(config: &ListenerConfig, metrics: Option<PrometheusHandle>) -> (Self, ServerHandle) {
        let (state_tx, state_rx) = watch::channel(ServerState::Serving);
        let (stop_tx, stop_rx) = watch::channel(false);
        let inflight = InFlightTracker::new();

        let state = AppState {
            server_state: state_rx.clone(),
            inflight: inflight.clone(),
            metrics,
        };

        let router = Self::build_router(config, state);
        let handle = ServerHandle {
            state_rx,
            stop_tx: Arc::new(stop_tx),
            inflight,
        };
        let server = Self {
            router,
            state_tx,
            stop_rx,
        };
        (server, handle)
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(middleware::from_fn_with_state(
                state.inflight.clone(),
                track_in_flight,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve connections on `listener` until the handle asks for shutdown
    /// and in-flight requests have finished.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let Self {
            router,
            state_tx,
            mut stop_rx,
        } = self;

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                state_tx.send_replace(ServerState::Failed(e.to_string()));
                return Err(e);
            }
        };
        tracing::info!(address = %addr, "HTTP server starting");

        // axum runs the shutdown signal on its own task; a weak sender there
        // lets the channel close when this task dies.
        let state_tx = Arc::new(state_tx);
        let draining_tx = Arc::downgrade(&state_tx);
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                if stop_rx.wait_for(|stop| *stop).await.is_err() {
                    // Every handle is gone, so nothing can ask for a drain.
                    std::future::pending::<()>().await;
                }
                if let Some(tx) = draining_tx.upgrade() {
                    tx.send_replace(ServerState::Draining);
                }
                tracing::info!("HTTP server draining");
            })
            .await;

        match &result {
            Ok(()) => {
                state_tx.send_replace(ServerState::Stopped);
                tracing::info!("HTTP server stopped");
            }
            Err(e) => {
                state_tx.send_replace(ServerState::Failed(e.to_string()));
                tracing::error!(error = %e, "HTTP server failed");
            }
        }
        result
    }
}

/// Stops a running [`HttpServer`].
#[derive(Clone)]
pub struct ServerHandle {
    state_rx: watch::Receiver<ServerState>,
    stop_tx: Arc<watch::Sender<bool>>,
    inflight: InFlightTracker,
}

impl ServerHandle {
    pub fn state(&self) -> ServerState {
        self.state_rx.borrow().clone()
    }
}

impl GracefulServer for ServerHandle {
    fn shutdown(&self) -> BoxFuture<'static, Result<(), ShutdownError>> {
        self.stop_tx.send_replace(true);

        let mut state_rx = self.state_rx.clone();
        Box::pin(async move {
            let finished = match state_rx.wait_for(ServerState::is_final).await {
                Ok(state) => state.clone(),
                // The server task was dropped, aborted or panicked.
                Err(_) => return Err(ShutdownError::ServerGone),
            };
            match finished {
                ServerState::Failed(e) => Err(ShutdownError::Server(e)),
                _ => Ok(()),
            }
        })
    }

    fn in_flight(&self) -> Option<u64> {
        Some(self.inflight.active_count())
    }
}

async fn track_in_flight(
    State(tracker): State<InFlightTracker>,
    request: Request,
    next: Next,
) -> Response {
    let guard = tracker.track();
    let method = request.method().to_string();
    let start = Instant::now();

    tracing::debug!(
        request = %guard.seq(),
        method = %method,
        path = %request.uri().path(),
        "Serving request"
    );
    let response = next.run(request).await;

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

async fn index_handler() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), "\n")
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = match *state.server_state.borrow() {
        ServerState::Serving => "serving",
        _ => "draining",
    };
    Json(json!({
        "status": status,
        "in_flight": state.inflight.active_count(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled\n").into_response(),
    }
}
