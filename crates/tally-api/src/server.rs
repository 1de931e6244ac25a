//! API server implementation.
//!
//! Wires the order desk to a ledger store, mounts the queue routes next to
//! health, ready and metrics, and runs the periodic merge alongside the HTTP
//! listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde::Serialize;
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tally_core::{Clock, Error, LedgerStore, MemoryLedger, Result, SystemClock};
use tally_queue::{MergeEngine, MergeStats, MergeTrigger, OrderDesk, TicketAllocator};

use crate::config::{Config, CorsConfig};
use crate::error::ApiError;
use crate::session::SessionStore;

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Merge statistics since startup.
    pub merge: MergeStats,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Allocation and merge entry point.
    pub desk: OrderDesk,
    /// Success-page sessions.
    pub sessions: SessionStore,
    store: Arc<dyn LedgerStore>,
}

impl AppState {
    /// Builds the state for `config` over `store`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the configured layout is invalid.
    pub fn new(config: Config, store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let layout = config.layout()?;
        let allocator =
            TicketAllocator::from_layout(Arc::clone(&store), &layout).with_clock(Arc::clone(&clock));
        let engine = MergeEngine::new(Arc::clone(&store)).with_time(layout.time);
        let trigger =
            MergeTrigger::new(engine, layout.merge_plan()).with_interval(config.merge_interval);
        let desk = OrderDesk::new(allocator, Arc::new(trigger))
            .with_merge_timeout(config.submit_merge_timeout);
        let sessions = SessionStore::with_clock(config.session_ttl, clock);

        Ok(Self {
            desk,
            sessions,
            config,
            store,
        })
    }

    /// Returns the ledger store behind the desk.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Liveness: returns 200 while the process is serving.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness: the ledger must answer a read of the secondary range, the
/// same read the periodic merge starts with.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let trigger = state.desk.trigger();

    match state.store().get(&trigger.plan().source_b).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
                merge: trigger.stats(),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("ledger check failed: {e}")),
                merge: trigger.stats(),
            }),
        ),
    }
}

async fn handle_timeout_error(_err: tower::BoxError) -> ApiError {
    ApiError::service_unavailable("Request timed out")
}

// ============================================================================
// Server
// ============================================================================

/// The Tally API server.
pub struct Server {
    config: Config,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("store", &"<LedgerStore>")
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server over an in-memory ledger.
    ///
    /// Use [`Server::with_ledger_store`] for production.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_ledger_store(config, Arc::new(MemoryLedger::new()))
    }

    /// Creates a server over an explicit ledger store.
    #[must_use]
    pub fn with_ledger_store(config: Config, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to stamp orders and expire sessions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds the shared handler state.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the configured layout is invalid.
    pub fn state(&self) -> Result<Arc<AppState>> {
        AppState::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        )
        .map(Arc::new)
    }

    /// Creates the router with all routes and middleware over `state`.
    ///
    /// The request timeout covers every route except `/submit-form`.
    pub fn router(&self, state: Arc<AppState>) -> Router {
        let timed = Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(crate::metrics::serve_metrics))
            .merge(crate::routes::queue_routes());

        let timed = match self.config.request_timeout {
            Some(timeout) => timed.layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_timeout_error))
                    .layer(TimeoutLayer::new(timeout)),
            ),
            None => timed,
        };

        let router = timed
            .merge(crate::routes::submission_routes())
            .route_layer(middleware::from_fn(crate::metrics::metrics_middleware))
            .layer(self.build_cors_layer())
            .layer(TraceLayer::new_for_http());

        let router = match self.config.concurrency_limit {
            Some(limit) => router.layer(ConcurrencyLimitLayer::new(limit)),
            None => router,
        };

        router.with_state(state)
    }

    /// Creates a router over fresh state.
    ///
    /// Intended for tests that drive the routes without binding a port.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the configured layout is invalid.
    #[doc(hidden)]
    pub fn test_router(&self) -> Result<Router> {
        Ok(self.router(self.state()?))
    }

    /// Builds the CORS layer from configuration.
    fn build_cors_layer(&self) -> CorsLayer {
        let cors_config = &self.config.cors;
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .max_age(Duration::from_secs(cors_config.max_age_seconds));
        Self::apply_cors_allowed_origins(cors, cors_config)
    }

    fn apply_cors_allowed_origins(cors: CorsLayer, cors_config: &CorsConfig) -> CorsLayer {
        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
            if cors_config.allowed_origins.len() == 1 {
                return cors.allow_origin(Any);
            }
            tracing::error!(
                origins = ?cors_config.allowed_origins,
                "Invalid CORS config: '*' must be the only allowed origin"
            );
            return cors;
        }

        let allowed: Vec<HeaderValue> = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::error!(origin = %origin, "Invalid CORS origin; expected a valid HeaderValue");
                    None
                }
            })
            .collect();

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            tracing::info!(origins = ?cors_config.allowed_origins, "CORS configured");
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// The periodic merge runs for as long as the listener does and is
    /// stopped after in-flight requests have drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, metrics cannot be
    /// installed, or the server cannot bind to the port.
    pub async fn serve(&self) -> Result<()> {
        self.config.validate()?;
        crate::metrics::init_metrics()?;

        let state = self.state()?;
        let router = self.router(Arc::clone(&state));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));

        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        let trigger = Arc::clone(state.desk.trigger());
        let periodic = tokio::spawn(trigger.run_periodic(async move {
            let _ = stop_rx.changed().await;
        }));

        tracing::info!(http_port = self.config.http_port, "Starting Tally API server");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal {
                message: format!("failed to bind to {addr}: {e}"),
            })?;

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal {
                message: format!("server error: {e}"),
            });

        let _ = stop_tx.send(true);
        if let Err(e) = periodic.await {
            tracing::error!(error = %e, "periodic merge task panicked");
        }
        tracing::info!("Tally API server stopped");
        served
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tally_test_utils::{OpKind, TracingLedger};
    use tower::ServiceExt;

    fn server(ledger: &TracingLedger) -> Server {
        let config = Config {
            debug: true,
            ..Config::default()
        };
        Server::with_ledger_store(config, Arc::new(ledger.clone()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(router: Router, uri: &str) -> (StatusCode, T) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = server(&TracingLedger::new()).test_router().unwrap();
        let (status, body): (_, HealthResponse) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn ready_reads_the_secondary_ledger() {
        let ledger = TracingLedger::new();
        let router = server(&ledger).test_router().unwrap();

        let (status, body): (_, serde_json::Value) = get_json(router, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
        assert_eq!(body["merge"]["successful"], 0);
        assert_eq!(ledger.operations_on("peepee").len(), 1);
    }

    #[tokio::test]
    async fn ready_is_unavailable_when_the_ledger_fails() {
        let ledger = TracingLedger::new();
        ledger.inject_failure(OpKind::Get, "peepee");
        let router = server(&ledger).test_router().unwrap();

        let (status, body): (_, serde_json::Value) = get_json(router, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);
        assert!(body["message"].as_str().unwrap().contains("ledger check failed"));
    }

    #[tokio::test]
    async fn state_uses_configured_merge_timing() {
        let config = Config {
            merge_interval: Duration::from_secs(5),
            submit_merge_timeout: Duration::from_millis(750),
            ..Config::default()
        };
        let server = Server::new(config);
        let state = server.state().unwrap();
        assert_eq!(state.desk.trigger().interval(), Duration::from_secs(5));
        assert_eq!(state.desk.merge_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn invalid_layout_fails_state_construction() {
        let mut config = Config::default();
        config.ledger.primary_range = "not a range".to_string();
        assert!(Server::new(config).state().is_err());
    }

    #[tokio::test]
    async fn cors_preflight_allows_configured_origin() {
        let config = Config {
            debug: true,
            cors: CorsConfig {
                allowed_origins: vec!["https://cafe.example".to_string()],
                ..CorsConfig::default()
            },
            ..Config::default()
        };
        let router = Server::new(config).test_router().unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/submit-form")
                    .header(header::ORIGIN, "https://cafe.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://cafe.example"
        );
    }
}
