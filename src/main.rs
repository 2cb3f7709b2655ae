use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

mod catalog;
mod config;
mod handler;
mod http;
mod logger;
mod server;

use catalog::CatalogProxy;
use config::{AppState, Config};

/// HTTP proxy between a dashboard frontend and a software catalog API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file, with or without extension
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = Config::load_from(&args.config)
        .with_context(|| format!("Failed to load configuration from '{}'", args.config))?;

    if args.check {
        println!("Configuration OK (catalog API: {})", cfg.plugin.api_url);
        return Ok(());
    }

    let dispatch = logger::build_dispatch(&cfg.logging).context("Failed to set up logging")?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(cfg, dispatch.clone()).with_subscriber(dispatch))
}

async fn async_main(cfg: Config, dispatch: Dispatch) -> anyhow::Result<()> {
    let addr = cfg.get_socket_addr().map_err(anyhow::Error::msg)?;
    let listener = server::create_reusable_listener(addr, cfg.server.backlog)
        .with_context(|| format!("Failed to bind {addr}"))?;

    let proxy = CatalogProxy::from_settings(&cfg.plugin, &cfg.upstream, dispatch.clone())?;
    logger::log_server_start(&addr, &cfg);
    tracing::debug!(api_url = proxy.api_url(), "Catalog proxy ready");

    let state = Arc::new(AppState::new(cfg, proxy, dispatch));
    server::start_server_loop(listener, state, server::shutdown_signal()).await;
    Ok(())
}
