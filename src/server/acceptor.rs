//! Listeners and per-connection handling.

use super::dispatch::Dispatcher;
use super::stats::ConnectionStats;
use crate::config::LimitsConfig;
use crate::modules::http_handler::{read_request, HttpError, Request, Router};
use crate::modules::websocket_handler::{
    is_websocket_upgrade, perform_upgrade, Session, SessionIdentity, SessionRegistry,
    SessionStream,
};
use crate::rooms::RoomManager;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// State shared by every connection task.
pub struct ConnectionContext {
    /// Routes for plain HTTP requests.
    pub router: Router,
    /// Room directory.
    pub rooms: Arc<dyn RoomManager>,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Framing limits.
    pub limits: LimitsConfig,
    /// Counters.
    pub stats: Arc<ConnectionStats>,
    /// Flips to `true` when the server shuts down.
    pub shutdown: watch::Receiver<bool>,
}

/// Accept connections until `shutdown` flips, handing each to `dispatcher`.
pub async fn accept_loop<F, Fut>(
    listener: TcpListener,
    name: &'static str,
    dispatcher: Arc<dyn Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
    handler: F,
) where
    F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(listener = name, peer = %peer, "Connection accepted");
                    dispatcher.dispatch(Box::pin(handler(stream, peer)));
                },
                Err(e) => {
                    warn!(listener = name, error = %e, "Accept error");
                },
            },
            _ = shutdown.changed() => break,
        }
    }
    info!(listener = name, "Listener stopped");
}

/// Serve one connection on the HTTP port.
///
/// Plain requests get exactly one response and the socket is closed. Upgrade
/// requests that pass validation become sessions; rejected upgrades are
/// closed without a response.
pub async fn handle_http_connection<S>(mut stream: S, peer: SocketAddr, ctx: Arc<ConnectionContext>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    ctx.stats.connection_accepted();

    let raw = match read_request(&mut stream, ctx.limits.max_request_size, ctx.limits.read_timeout)
        .await
    {
        Ok(raw) => raw,
        Err(HttpError::ConnectionClosed) => {
            debug!(peer = %peer, "Connection closed before sending data");
            return;
        },
        Err(e) => {
            debug!(peer = %peer, error = %e, "Failed to read request");
            return;
        },
    };

    let request = Request::parse(&raw);
    ctx.stats.request_handled();
    debug!(peer = %peer, method = %request.method(), path = %request.path(), "Request");

    if is_websocket_upgrade(&request) {
        match perform_upgrade(stream, &request).await {
            Ok(conn) => {
                ctx.stats.upgrade_succeeded();
                let (session, incoming) = Session::from_upgraded(conn, Arc::clone(&ctx.rooms)).await;
                run_session(session, incoming, &ctx).await;
            },
            Err(e) => {
                ctx.stats.upgrade_failed();
                warn!(peer = %peer, path = %request.path(), error = %e, "Upgrade aborted");
            },
        }
        return;
    }

    let response = ctx.router.dispatch(request);
    ctx.stats.response_sent(response.status());

    if let Err(e) = stream.write_all(&response.serialize()).await {
        warn!(peer = %peer, error = %e, "Failed to write response");
        return;
    }
    let _ = stream.shutdown().await;
}

/// Serve one connection on the dedicated WebSocket port.
///
/// The handshake happens here and the session has no identity until JOIN.
pub async fn handle_websocket_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ConnectionContext>) {
    ctx.stats.connection_accepted();

    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            ctx.stats.upgrade_failed();
            warn!(peer = %peer, error = %e, "WebSocket handshake failed");
            return;
        },
    };
    ctx.stats.upgrade_succeeded();

    let (session, incoming) = Session::new(ws, SessionIdentity::default(), Arc::clone(&ctx.rooms));
    run_session(session, incoming, &ctx).await;
}

async fn run_session<S>(session: Arc<Session>, incoming: SessionStream<S>, ctx: &ConnectionContext)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    if let Some(peer_id) = session.peer_id() {
        ctx.registry.register(peer_id, Arc::clone(&session)).await;
    }
    ctx.stats.session_opened();

    // Sessions without a peer id are not in the registry, so shutdown
    // reaches them through the signal instead.
    let run = Arc::clone(&session).run(incoming, Arc::clone(&ctx.registry));
    tokio::pin!(run);
    let messages = tokio::select! {
        messages = &mut run => messages,
        () = shutdown_requested(ctx.shutdown.clone()) => {
            session.close().await;
            run.await
        },
    };
    ctx.stats.session_closed(messages);
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone
/// without signalling.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
