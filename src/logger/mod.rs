//! Logger module
//!
//! Builds the `tracing` dispatcher used by the whole process and provides:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//!
//! The dispatcher is never installed as the global default; `main` hands it
//! to the server and the catalog proxy explicitly.

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat};

use std::io;
use std::net::SocketAddr;

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat, LoggingConfig};

/// Target of access log events, usable in `RUST_LOG` directives
pub const ACCESS_TARGET: &str = "access";

/// Build the dispatcher described by the logging configuration
///
/// `RUST_LOG`, when set, takes precedence over `logging.level`.
pub fn build_dispatch(config: &LoggingConfig) -> io::Result<Dispatch> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => parse_filter(&directives)?,
        _ => parse_filter(&config.level)?,
    };
    let writer = writer::make_writer(config.log_file.as_deref())?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.log_file.is_none())
        .with_target(true);

    Ok(match config.format {
        LogFormat::Text => Dispatch::new(builder.finish()),
        LogFormat::Json => Dispatch::new(builder.json().finish()),
    })
}

fn parse_filter(directives: &str) -> io::Result<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid log filter '{directives}': {e}"),
        )
    })
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        listen = %addr,
        api_url = %config.plugin.api_url,
        workers = ?config.server.workers,
        "Catalog proxy started"
    );
    if !config.routes.base_path.is_empty() {
        tracing::info!(base_path = %config.routes.base_path, "Serving under base path");
    }
    if let Some(ref path) = config.logging.log_file {
        tracing::info!("Log file: {path}");
    }
}

/// Emit one formatted access log line
pub fn log_access(entry: &AccessLogEntry, format: &AccessLogFormat) {
    tracing::info!(target: ACCESS_TARGET, "{}", entry.format(format));
}
