// Connection module
// Accepts one TCP connection and serves it with hyper HTTP/1.1

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::{Body, Incoming};
use hyper::header::SERVER;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::sync::watch;
use tracing::instrument::WithSubscriber;

use crate::config::AppState;
use crate::handler;
use crate::http::ProxyBody;
use crate::logger::{self, AccessLogEntry};

/// Accept a connection, enforcing `performance.max_connections`.
///
/// The counter is incremented before the limit check so two concurrent
/// accepts cannot both slip under the limit.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) {
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                peer = %peer_addr,
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            );
            drop(stream);
            return;
        }
    }

    tracing::debug!(peer = %peer_addr, "Connection accepted");
    let dispatch = state.dispatch.clone();
    tokio::spawn(
        handle_connection(stream, peer_addr, Arc::clone(state), shutdown).with_subscriber(dispatch),
    );
}

/// Serve one connection until the client closes it or shutdown is signalled.
///
/// On shutdown, in-flight requests are completed and the connection closed
/// afterwards instead of being dropped.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let performance = &state.config.performance;

    let mut builder = http1::Builder::new();
    builder.keep_alive(performance.keep_alive);
    if performance.read_timeout > 0 {
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(performance.read_timeout));
    }

    let service_state = Arc::clone(&state);
    let service = service_fn(move |req: Request<Incoming>| {
        serve_request(req, peer_addr, Arc::clone(&service_state))
    });

    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(err) = result {
        if err.is_timeout() {
            tracing::debug!(peer = %peer_addr, "Connection timed out reading headers");
        } else if !err.is_incomplete_message() {
            tracing::error!(peer = %peer_addr, "Failed to serve connection: {err}");
        }
    }

    state.active_connections.fetch_sub(1, Ordering::SeqCst);
}

/// Route one request, stamp the `Server` header and write the access log line
async fn serve_request(
    req: Request<Incoming>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<ProxyBody>, Infallible> {
    let started = Instant::now();
    let mut entry = state
        .config
        .logging
        .access_log
        .then(|| AccessLogEntry::from_request(peer_addr, &req));

    let mut response = handler::handle_request(req, Arc::clone(&state)).await?;

    if let Some(server) = &state.server_header {
        response.headers_mut().insert(SERVER, server.clone());
    }

    if let Some(entry) = entry.as_mut() {
        entry.complete(
            response.status().as_u16(),
            response.body().size_hint().exact(),
            started.elapsed(),
        );
        logger::log_access(entry, &state.access_log_format);
    }

    Ok(response)
}
