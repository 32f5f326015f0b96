//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router (public + admin surfaces)
//! - Wire up middleware (request ID, tracing, timeout, request metrics)
//! - Spawn the fleet monitor next to the listener
//! - Serve until the shutdown signal, then drain

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::FleetConfig;
use crate::http::handlers;
use crate::http::request::{MakeRequestUuid, RequestIdExt};
use crate::lifecycle::{ControlPlane, Shutdown};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub plane: Arc<ControlPlane>,
}

/// HTTP front of the control plane.
pub struct HttpServer {
    router: Router,
    plane: Arc<ControlPlane>,
}

impl HttpServer {
    pub fn new(config: FleetConfig) -> Self {
        let plane = Arc::new(ControlPlane::new(config));
        let state = AppState {
            plane: plane.clone(),
        };
        let router = Self::build_router(&plane.config, state);
        Self { router, plane }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FleetConfig, state: AppState) -> Router {
        let public = Router::new()
            .route("/health-report", post(handlers::report_health))
            .route("/select", get(handlers::select_server))
            .route("/servers/{id}/connections", post(handlers::adjust_connections))
            .route("/servers/{id}/health", get(handlers::latest_health))
            .route("/servers/{id}/health/history", get(handlers::health_history));

        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.headers().request_id(),
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        public
            .merge(admin::router(state.clone()))
            .route_layer(middleware::from_fn(record_request_metrics))
            .with_state(state)
            .layer(layers)
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. The fleet monitor runs alongside and stops with it.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let monitor = self.plane.monitor();
        let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        if let Err(e) = monitor_task.await {
            tracing::error!(error = %e, "Fleet monitor task failed");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Shared handle on the running components.
    pub fn plane(&self) -> Arc<ControlPlane> {
        self.plane.clone()
    }
}

async fn record_request_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    metrics::record_request(&method, &path, response.status().as_u16(), start);
    response
}
