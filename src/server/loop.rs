// Server loop module
// Accepts connections until shutdown, then drains the ones still open

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use super::connection::accept_connection;
use crate::config::AppState;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the accept loop until `shutdown` resolves.
///
/// The listener is closed as soon as shutdown starts; open connections get
/// up to `performance.shutdown_timeout` seconds to finish their requests.
pub async fn start_server_loop<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, shutdown_rx.clone());
                    }
                    Err(e) => tracing::error!("Failed to accept connection: {e}"),
                }
            }

            () = &mut shutdown => break,
        }
    }

    drop(listener);
    shutdown_tx.send_replace(true);
    drain_connections(&state).await;
}

/// Wait for the active connection count to reach zero, bounded by the shutdown timeout
async fn drain_connections(state: &AppState) {
    let timeout = Duration::from_secs(state.config.performance.shutdown_timeout);
    let open = state.active_connections.load(Ordering::SeqCst);
    if open == 0 {
        tracing::info!("Server stopped");
        return;
    }

    tracing::info!("Waiting up to {}s for {open} open connection(s)", timeout.as_secs());
    let drained = tokio::time::timeout(timeout, async {
        while state.active_connections.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    })
    .await;

    if drained.is_ok() {
        tracing::info!("Server stopped");
    } else {
        tracing::warn!(
            remaining = state.active_connections.load(Ordering::SeqCst),
            "Shutdown timeout elapsed, dropping open connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProxy;
    use crate::config::Config;
    use crate::server::create_reusable_listener;
    use tokio::sync::oneshot;
    use tracing::Dispatch;

    type Running = (std::net::SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>);

    async fn spawn_server(extra: &str) -> Running {
        spawn_server_for("http://127.0.0.1:9", extra).await
    }

    async fn spawn_server_for(api_url: &str, extra: &str) -> Running {
        let config = Config::from_toml(&format!(
            "[plugin]\napi_url = \"{api_url}\"\n{extra}"
        ))
        .unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let proxy = CatalogProxy::new(client, config.plugin.api_url.clone(), Dispatch::none());
        let state = Arc::new(AppState::new(config, proxy, Dispatch::none()));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(start_server_loop(listener, state, async {
            let _ = rx.await;
        }));
        (addr, tx, handle)
    }

    #[tokio::test]
    async fn test_serves_health_with_server_header() {
        let (addr, stop, handle) = spawn_server("[http]\nserver_name = \"catalog-test\"\n").await;

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client
            .get(format!("http://{addr}/healthz"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()["server"], "catalog-test");
        assert_eq!(response.text().await.unwrap(), "ok");

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (addr, stop, handle) = spawn_server("").await;

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_max_connections_rejects_extra_clients() {
        let (addr, stop, handle) =
            spawn_server("[performance]\nmax_connections = 1\nshutdown_timeout = 1\n").await;

        // first connection holds the only slot
        let _held = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let result = client.get(format!("http://{addr}/healthz")).send().await;
        assert!(result.is_err());

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    /// Catalog stand-in that reads one request and never answers
    ///
    /// Reports when the request arrived and when the proxy closed the socket.
    async fn spawn_silent_catalog() -> (String, oneshot::Receiver<()>, oneshot::Receiver<()>) {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (got_tx, got_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = got_tx.send(());
            while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
            let _ = closed_tx.send(());
        });
        (format!("http://{addr}"), got_rx, closed_rx)
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_upstream_call() {
        use tokio::io::AsyncWriteExt;

        let (api_url, got_request, upstream_closed) = spawn_silent_catalog().await;
        let (addr, stop, handle) = spawn_server_for(&api_url, "").await;

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /catalog/entity-facets?facet=kind HTTP/1.1\r\nHost: proxy\r\n\r\n")
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), got_request)
            .await
            .unwrap()
            .unwrap();

        drop(client);
        tokio::time::timeout(Duration::from_secs(5), upstream_closed)
            .await
            .expect("upstream call still open after client disconnect")
            .unwrap();

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_disabled_closes_connection() {
        let (addr, stop, handle) = spawn_server("[performance]\nkeep_alive = false\n").await;

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client
            .get(format!("http://{addr}/healthz"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()["connection"], "close");

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
