//! Control socket.
//!
//! Newline-delimited JSON over a local TCP socket: one [`ControlRequest`] per
//! line in, one [`ControlResponse`] per line out. Commands run against the
//! live [`ServerContext`], so blocklist and cache changes reach the running
//! handlers instead of only the database underneath them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::admin::handlers;
use crate::context::ServerContext;
use crate::storage::StoreError;

/// A single admin command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlRequest {
    Stats,
    CacheStats,
    Logs { limit: usize },
    CachedUrls,
    Blocked,
    Block { domain: String },
    Unblock { domain: String },
    ClearCache,
    SetCacheEnabled { enabled: bool },
    SeedDemo,
}

impl ControlRequest {
    /// Commands whose effect lives only in a running proxy's memory.
    pub fn requires_running_proxy(&self) -> bool {
        matches!(self, ControlRequest::SetCacheEnabled { .. })
    }
}

/// Reply to one [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlResponse {
    Ok(Value),
    Error(String),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control connection failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed control message: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("proxy rejected command: {0}")]
    Rejected(String),

    #[error("control connection closed before a reply")]
    Closed,
}

/// Run `request` against `ctx` and return its JSON result.
pub async fn execute(ctx: &ServerContext, request: ControlRequest) -> Result<Value, ControlError> {
    let value = match request {
        ControlRequest::Stats => serde_json::to_value(handlers::get_stats(ctx).await?)?,
        ControlRequest::CacheStats => serde_json::to_value(handlers::get_cache_stats(ctx))?,
        ControlRequest::Logs { limit } => {
            serde_json::to_value(handlers::get_recent_logs(ctx, limit).await?)?
        }
        ControlRequest::CachedUrls => serde_json::to_value(handlers::get_cached_urls(ctx))?,
        ControlRequest::Blocked => serde_json::to_value(handlers::list_blocked_domains(ctx))?,
        ControlRequest::Block { domain } => {
            handlers::add_blocked_domain(ctx, &domain).await?;
            serde_json::to_value(handlers::list_blocked_domains(ctx))?
        }
        ControlRequest::Unblock { domain } => {
            handlers::remove_blocked_domain(ctx, &domain).await?;
            serde_json::to_value(handlers::list_blocked_domains(ctx))?
        }
        ControlRequest::ClearCache => {
            handlers::clear_cache(ctx).await?;
            serde_json::to_value(handlers::get_cache_stats(ctx))?
        }
        ControlRequest::SetCacheEnabled { enabled } => {
            handlers::set_cache_enabled(ctx, enabled);
            serde_json::json!({ "cache_enabled": ctx.cache_enabled() })
        }
        ControlRequest::SeedDemo => {
            handlers::seed_demo_cache(ctx).await?;
            serde_json::to_value(handlers::get_cached_urls(ctx))?
        }
    };
    Ok(value)
}

/// Serves [`ControlRequest`]s for a running proxy.
pub struct ControlServer {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
}

impl ControlServer {
    pub async fn bind(ctx: Arc<ServerContext>, address: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { ctx, listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept control sessions until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(address = %addr, "Control socket listening");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            if let Err(e) = serve_session(&ctx, stream).await {
                                tracing::debug!(peer = %peer, error = %e, "Control session ended");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Control accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }
        tracing::info!("Control socket closed");
    }
}

async fn serve_session(ctx: &ServerContext, stream: TcpStream) -> Result<(), ControlError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                tracing::debug!(?request, "Control command");
                match execute(ctx, request).await {
                    Ok(value) => ControlResponse::Ok(value),
                    Err(e) => ControlResponse::Error(e.to_string()),
                }
            }
            Err(e) => ControlResponse::Error(format!("invalid request: {e}")),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }
    Ok(())
}

/// Client side of the control socket, used by `proxy-cli`.
pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ControlClient {
    pub async fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    pub async fn send(&mut self, request: &ControlRequest) -> Result<Value, ControlError> {
        let mut out = serde_json::to_vec(request)?;
        out.push(b'\n');
        self.writer.write_all(&out).await?;

        let line = self.lines.next_line().await?.ok_or(ControlError::Closed)?;
        match serde_json::from_str(&line)? {
            ControlResponse::Ok(value) => Ok(value),
            ControlResponse::Error(message) => Err(ControlError::Rejected(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::lifecycle::Shutdown;

    async fn context() -> Arc<ServerContext> {
        let mut config = ProxyConfig::default();
        config.storage.database_url = "sqlite::memory:".into();
        ServerContext::open(config).await.unwrap()
    }

    async fn serve(ctx: Arc<ServerContext>, shutdown: &Shutdown) -> String {
        let server = ControlServer::bind(ctx, "127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(server.run(shutdown.subscribe()));
        addr
    }

    #[test]
    fn requests_are_tagged_by_command() {
        let json = serde_json::to_value(ControlRequest::Block { domain: "a.test".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "command": "block", "domain": "a.test" }));

        let parsed: ControlRequest = serde_json::from_str(r#"{"command":"clear_cache"}"#).unwrap();
        assert_eq!(parsed, ControlRequest::ClearCache);
        assert!(ControlRequest::SetCacheEnabled { enabled: false }.requires_running_proxy());
        assert!(!ControlRequest::Stats.requires_running_proxy());
    }

    #[tokio::test]
    async fn execute_mutates_live_context() {
        let ctx = context().await;

        let blocked = execute(&ctx, ControlRequest::Block { domain: "a.test".into() }).await.unwrap();
        assert_eq!(blocked, serde_json::json!(["a.test"]));
        assert!(ctx.blocklist.contains("a.test"));

        let toggled = execute(&ctx, ControlRequest::SetCacheEnabled { enabled: false }).await.unwrap();
        assert_eq!(toggled["cache_enabled"], false);
        assert!(!ctx.cache_enabled());
    }

    #[tokio::test]
    async fn session_answers_each_line_in_order() {
        let ctx = context().await;
        let shutdown = Shutdown::new();
        let addr = serve(ctx.clone(), &shutdown).await;

        let mut client = ControlClient::connect(&addr).await.unwrap();
        client.send(&ControlRequest::SeedDemo).await.unwrap();
        let stats = client.send(&ControlRequest::CacheStats).await.unwrap();
        assert_eq!(stats["total_cached"], 4);

        client.send(&ControlRequest::ClearCache).await.unwrap();
        assert!(ctx.cache.is_empty());
        shutdown.trigger();
    }

    #[tokio::test]
    async fn invalid_line_is_rejected_without_closing() {
        let ctx = context().await;
        let shutdown = Shutdown::new();
        let addr = serve(ctx, &shutdown).await;

        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream.write_all(b"{\"command\":\"reboot\"}\n").await.unwrap();
        let (reader, _writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let reply: ControlResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(reply, ControlResponse::Error(ref m) if m.starts_with("invalid request")));
        shutdown.trigger();
    }
}
