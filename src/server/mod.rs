//! # Signaling Server
//!
//! Owns the listeners and the shared state they hand to connection tasks.
//!
//! One HTTP listener always runs; it serves the room API and upgrades
//! `GET /room/:room_id/:role` to a signaling session. A second listener
//! that speaks WebSocket from the first byte is started when
//! `server.websocket_port` is configured. Sessions from both listeners
//! share one [`SessionRegistry`].

mod acceptor;
mod dispatch;
mod error;
mod stats;

pub use acceptor::{
    accept_loop, handle_http_connection, handle_websocket_connection, ConnectionContext,
};
pub use dispatch::{Dispatcher, Unbounded};
pub use error::{ServerError, ServerResult};
pub use stats::{ConnectionStats, StatsSnapshot};

use crate::config::ServerConfig;
use crate::modules::http_handler::build_router;
use crate::modules::websocket_handler::SessionRegistry;
use crate::rooms::RoomManager;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Not accepting connections.
    Stopped,
    /// Listeners are running.
    Running,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// The signaling front door.
pub struct SignalingServer {
    config: ServerConfig,
    rooms: Arc<dyn RoomManager>,
    registry: Arc<SessionRegistry>,
    stats: Arc<ConnectionStats>,
    dispatcher: Arc<dyn Dispatcher>,
    status: ServerStatus,
    shutdown: Option<watch::Sender<bool>>,
    listeners: Vec<JoinHandle<()>>,
    websocket_addr: Option<SocketAddr>,
}

impl fmt::Debug for SignalingServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingServer")
            .field("status", &self.status)
            .field("dispatcher", &self.dispatcher)
            .field("websocket_addr", &self.websocket_addr)
            .finish_non_exhaustive()
    }
}

impl SignalingServer {
    /// Create a stopped server.
    #[must_use]
    pub fn new(config: ServerConfig, rooms: Arc<dyn RoomManager>) -> Self {
        Self {
            config,
            rooms,
            registry: Arc::new(SessionRegistry::new()),
            stats: Arc::new(ConnectionStats::default()),
            dispatcher: Arc::new(Unbounded),
            status: ServerStatus::Stopped,
            shutdown: None,
            listeners: Vec::new(),
            websocket_addr: None,
        }
    }

    /// Replace the connection dispatch policy.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Bind the listeners and start accepting.
    ///
    /// Returns the bound HTTP address, which differs from the configured one
    /// when port 0 was requested.
    ///
    /// # Errors
    ///
    /// Fails if the server is already running, the address is invalid or a
    /// listener cannot be bound.
    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        if self.status == ServerStatus::Running {
            return Err(ServerError::InvalidState {
                current: self.status.to_string(),
                expected: ServerStatus::Stopped.to_string(),
            });
        }

        let section = &self.config.server;
        let http_addr = section.http_addr().ok_or_else(|| {
            ServerError::InvalidAddress(format!("{}:{}", section.host, section.port))
        })?;
        let http_listener = bind(http_addr).await?;
        let local_http = http_listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr: http_addr, source })?;

        let websocket_listener = match section.websocket_port {
            Some(port) => {
                let addr = section.websocket_addr().ok_or_else(|| {
                    ServerError::InvalidAddress(format!("{}:{}", section.host, port))
                })?;
                let listener = bind(addr).await?;
                let local = listener
                    .local_addr()
                    .map_err(|source| ServerError::Bind { addr, source })?;
                Some((listener, local))
            },
            None => None,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(ConnectionContext {
            router: build_router(Arc::clone(&self.rooms), &self.config.limits),
            rooms: Arc::clone(&self.rooms),
            registry: Arc::clone(&self.registry),
            limits: self.config.limits.clone(),
            stats: Arc::clone(&self.stats),
            shutdown: shutdown_rx.clone(),
        });

        let http_ctx = Arc::clone(&ctx);
        self.listeners.push(tokio::spawn(accept_loop(
            http_listener,
            "http",
            Arc::clone(&self.dispatcher),
            shutdown_rx.clone(),
            move |stream, peer| handle_http_connection(stream, peer, Arc::clone(&http_ctx)),
        )));
        info!(addr = %local_http, "HTTP listener started");

        if let Some((listener, local)) = websocket_listener {
            let ws_ctx = Arc::clone(&ctx);
            self.listeners.push(tokio::spawn(accept_loop(
                listener,
                "websocket",
                Arc::clone(&self.dispatcher),
                shutdown_rx,
                move |stream, peer| handle_websocket_connection(stream, peer, Arc::clone(&ws_ctx)),
            )));
            self.websocket_addr = Some(local);
            info!(addr = %local, "WebSocket listener started");
        }

        self.shutdown = Some(shutdown_tx);
        self.status = ServerStatus::Running;
        Ok(local_http)
    }

    /// Bound address of the raw WebSocket listener while running.
    pub fn websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket_addr
    }

    /// Stop the listeners and close every session.
    ///
    /// # Errors
    ///
    /// Fails if the server is not running.
    pub async fn shutdown(&mut self) -> ServerResult<()> {
        if self.status != ServerStatus::Running {
            return Err(ServerError::InvalidState {
                current: self.status.to_string(),
                expected: ServerStatus::Running.to_string(),
            });
        }

        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        for handle in self.listeners.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Listener task failed");
            }
        }

        let closed = self.registry.close_all().await;
        let stats = self.stats.snapshot();
        info!(
            sessions_closed = closed,
            connections = stats.connections_accepted,
            requests = stats.requests_handled,
            upgrades = stats.upgrades_succeeded,
            messages = stats.messages_received,
            "Server stopped"
        );

        self.websocket_addr = None;
        self.status = ServerStatus::Stopped;
        Ok(())
    }

    /// Current status.
    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Live sessions, for pushing frames from outside a session.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Room directory.
    pub fn rooms(&self) -> &Arc<dyn RoomManager> {
        &self.rooms
    }
}

async fn bind(addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}
