//! `ParleyServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use parley_core::ConnectionId;
use parley_engine::Engine;

use crate::config::ServerConfig;
use crate::health::HealthResponse;
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastRouter;
use crate::websocket::handler::DispatchContext;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Everything frame dispatch needs (engine, registry, router, config).
    pub ctx: Arc<DispatchContext>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Handle for rendering `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The main Parley server.
pub struct ParleyServer {
    config: Arc<ServerConfig>,
    engine: Arc<Engine>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<BroadcastRouter>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl ParleyServer {
    /// Create a new server over an engine.
    #[must_use]
    pub fn new(config: ServerConfig, engine: Arc<Engine>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(BroadcastRouter::new(Arc::clone(&registry)));
        Self {
            config: Arc::new(config),
            engine,
            registry,
            router,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Attach an installed Prometheus recorder handle for `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = AppState {
            ctx: Arc::new(DispatchContext {
                engine: Arc::clone(&self.engine),
                registry: Arc::clone(&self.registry),
                router: Arc::clone(&self.router),
                config: Arc::clone(&self.config),
            }),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/ws/{room}", get(ws_room_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve, returning the bound address and the serve task.
    ///
    /// The serve task drains on the shutdown coordinator's token.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "server listening");

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });

        Ok((local_addr, handle))
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the broadcast router.
    pub fn broadcast(&self) -> &Arc<BroadcastRouter> {
        &self.router
    }

    /// Get the engine.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.ctx.registry.connection_count();
    let sessions = state.ctx.engine.directory.list_active().len();
    Json(HealthResponse::snapshot(
        state.start_time,
        connections,
        sessions,
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(metrics::render)
        .unwrap_or_default()
}

/// GET /ws — WebSocket upgrade for the default room.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    upgrade(state, ws, "default".to_owned())
}

/// GET /ws/{room} — WebSocket upgrade for a named legacy chat room.
async fn ws_room_handler(
    State(state): State<AppState>,
    Path(room): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, room)
}

fn upgrade(state: AppState, ws: WebSocketUpgrade, room: String) -> Response {
    if state.ctx.registry.connection_count() >= state.ctx.config.max_connections {
        warn!(
            max_connections = state.ctx.config.max_connections,
            "connection limit reached, rejecting upgrade"
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let conn_id = ConnectionId::new();
    let max_message_size = state.ctx.config.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, conn_id, room, state.ctx))
}
