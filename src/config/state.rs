// Application state module
// Everything a connection task needs, shared behind one Arc

use std::sync::atomic::AtomicUsize;

use hyper::header::HeaderValue;
use tracing::Dispatch;

use super::types::Config;
use crate::catalog::CatalogProxy;
use crate::logger::AccessLogFormat;

/// Application state
pub struct AppState {
    pub config: Config,
    pub proxy: CatalogProxy,
    /// Receives server-level events (connections, access log)
    pub dispatch: Dispatch,
    pub active_connections: AtomicUsize,
    pub access_log_format: AccessLogFormat,
    /// `Server` header value, absent when `http.server_name` is empty or not a valid header
    pub server_header: Option<HeaderValue>,
}

impl AppState {
    pub fn new(config: Config, proxy: CatalogProxy, dispatch: Dispatch) -> Self {
        let access_log_format = AccessLogFormat::parse(&config.logging.access_log_format);
        let server_header = Some(config.http.server_name.as_str())
            .filter(|name| !name.is_empty())
            .and_then(|name| HeaderValue::from_str(name).ok());

        Self {
            config,
            proxy,
            dispatch,
            active_connections: AtomicUsize::new(0),
            access_log_format,
            server_header,
        }
    }
}
