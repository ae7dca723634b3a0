//! Forward HTTP Proxy
//!
//! A caching forward proxy with a domain blocklist, built on Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                FORWARD PROXY                 │
//!                     │                                              │
//!   Client Request    │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│   net    │──▶│  http   │──▶│ blocklist │──┼─▶ 403
//!                     │  │ listener │   │ handler │   └─────┬─────┘  │
//!                     │  └──────────┘   └─────────┘         │        │
//!                     │                                     ▼        │
//!                     │                               ┌───────────┐  │
//!                     │                               │   cache   │──┼─▶ hit
//!                     │                               └─────┬─────┘  │
//!                     │                                     ▼        │
//!   Client Response   │                               ┌───────────┐  │
//!   ◀─────────────────┼───────────────────────────────│ forwarder │◀─┼──── Origin
//!                     │                               └───────────┘  │
//!                     │                                              │
//!                     │  history (request log) · storage (SQLite)    │
//!                     │  admin (control socket for proxy-cli)        │
//!                     │  config · lifecycle · observability          │
//!                     └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use forward_proxy::admin::ControlServer;
use forward_proxy::config::{load_or_default, ConfigWatcher};
use forward_proxy::context::ServerContext;
use forward_proxy::http::ProxyServer;
use forward_proxy::lifecycle::{signals, Shutdown};
use forward_proxy::net::Listener;
use forward_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Caching forward HTTP proxy with a domain blocklist", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        database_url = %config.storage.database_url,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let ctx = ServerContext::open(config).await?;
    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    // Hot reload; the watcher handle must outlive the server.
    let _watcher = match cli.config.as_deref() {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let reload_ctx = Arc::clone(&ctx);
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop.recv() => break,
                        update = updates.recv() => match update {
                            Some(config) => reload_ctx.apply_config(config).await,
                            None => break,
                        },
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    let admin = ctx.config().admin.clone();
    if admin.control_enabled {
        let control = ControlServer::bind(Arc::clone(&ctx), &admin.control_address).await?;
        tokio::spawn(control.run(shutdown.subscribe()));
    }

    let server = ProxyServer::new(Arc::clone(&ctx));
    server.run(listener, shutdown.subscribe()).await?;

    let drain = ctx.config().timeouts.drain();
    if !ctx.connections.wait_for_drain(drain).await {
        tracing::warn!(
            remaining = ctx.connections.active_count(),
            "Drain timeout elapsed with connections still open"
        );
    }
    ctx.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
