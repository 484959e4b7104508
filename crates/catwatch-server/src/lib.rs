//! Catwatch Server - local HTTP event ingress.
//!
//! Stands in for the process-wide event bus: the traffic layer, the separate
//! local matching process and the category lifecycle manager post their
//! events here and the server queues them for the examiner.
//!
//! ## Endpoints
//!
//! - `POST /api/events/match` - raw `{ domain }` match message
//! - `POST /api/events` - tagged event (`DOMAIN_DETECTED`, `FILTER_GENERATION_UPDATED`, `CATEGORY_DEACTIVATED`)
//! - `GET /api/health` - liveness and queue depth
//! - `GET /api/feature` / `PUT /api/feature` - category filter switch

pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 48766;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/events/match", post(handlers::post_match))
        .route("/api/events", post(handlers::post_event))
        .route("/api/health", get(handlers::health))
        .route("/api/feature", get(handlers::get_feature).put(handlers::put_feature))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The ingress server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a server over the given state.
    pub fn with_state(config: ServerConfig, state: AppState) -> std::result::Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self {
            router: router(state),
            addr,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> std::result::Result<(), ServerError> {
        info!("Starting Catwatch ingress server on {}", self.addr);

        let listener = bind(self.addr).map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Ingress server stopped");
        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Binds with SO_REUSEADDR so a restart is not blocked by TIME_WAIT sockets.
fn bind(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    socket.set_nonblocking(true)?;

    tokio::net::TcpListener::from_std(socket.into())
}
