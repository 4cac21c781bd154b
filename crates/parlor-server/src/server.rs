//! `ParlorServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use parlor_store::{Database, ServerRepo, UserRepo};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::accounts;
use crate::assets;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::relay::{RelayError, RelayHub};
use crate::shutdown::ShutdownCoordinator;

/// Errors starting the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },
    /// Other socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay hub for `/webs`.
    pub hub: Arc<RelayHub>,
    /// Account repository.
    pub users: UserRepo,
    /// Chat server repository.
    pub servers: ServerRepo,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The Parlor server.
pub struct ParlorServer {
    config: Arc<ServerConfig>,
    hub: Arc<RelayHub>,
    users: UserRepo,
    servers: ServerRepo,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl ParlorServer {
    /// Create a new server over `db`.
    pub fn new(config: ServerConfig, db: Database) -> Self {
        Self::with_shutdown_token(config, db, CancellationToken::new())
    }

    /// Create a server that shuts down when `token` is cancelled.
    pub fn with_shutdown_token(
        config: ServerConfig,
        db: Database,
        token: CancellationToken,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::with_token(token));
        let hub = Arc::new(
            RelayHub::new(config.relay.clone(), shutdown.relay_token())
                .with_max_connections(config.max_connections),
        );
        Self {
            config: Arc::new(config),
            hub,
            users: UserRepo::new(db.clone()),
            servers: ServerRepo::new(db),
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Expose `/metrics` through `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            users: self.users.clone(),
            servers: self.servers.clone(),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/webs", get(relay_handler))
            .route("/submit", post(accounts::submit))
            .route("/login", post(accounts::login))
            .route("/servers", post(accounts::servers))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .merge(assets::routes(&self.config.static_dir))
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// The task stops accepting once the shutdown token is cancelled, then
    /// closes every relay connection.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "parlor server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let hub = Arc::clone(&self.hub);
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "http server exited with error");
            }
            let _ = hub.shutdown();
        });
        Ok((local_addr, handle))
    }

    /// The relay hub.
    pub fn hub(&self) -> &Arc<RelayHub> {
        &self.hub
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /webs
async fn relay_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            let err = RelayError::Upgrade(rejection.body_text());
            warn!(error = %err, "relay upgrade rejected");
            return rejection.into_response();
        }
    };
    if state.hub.is_shut_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    // Fast path only; `RelayHub::register` enforces the limit atomically.
    if state.hub.connection_count() >= state.hub.max_connections() {
        warn!(
            max = state.hub.max_connections(),
            "relay connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let hub = state.hub;
    ws.max_message_size(hub.config().max_message_size)
        .on_failed_upgrade(|e: axum::Error| {
            let err = RelayError::Upgrade(e.to_string());
            warn!(error = %err, "relay upgrade failed");
        })
        .on_upgrade(move |socket| hub.serve(socket))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, &state.hub))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not enabled").into_response(),
    }
}
