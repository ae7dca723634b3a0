//! Per-connection request pipeline.
//!
//! Read → parse → blocklist → cache | forward → log → respond → close.
//! Every failure is handled here; nothing escapes to the acceptor.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::Instrument;

use crate::context::ServerContext;
use crate::history::LogEntry;
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::request::ProxyRequest;
use crate::http::response;
use crate::net::{Connection, ConnectionGuard, ConnectionState};
use crate::observability::metrics;

/// How a request was answered.
#[derive(Debug)]
pub enum Outcome {
    Blocked,
    CacheHit,
    Forwarded,
    GatewayError(ForwardError),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Blocked => "blocked",
            Outcome::CacheHit => "cache_hit",
            Outcome::Forwarded => "forwarded",
            Outcome::GatewayError(_) => "gateway_error",
        }
    }
}

/// The bytes to send back and what to record about them.
#[derive(Debug)]
pub struct Reply {
    pub outcome: Outcome,
    pub status: u16,
    pub bytes: Vec<u8>,
    /// Size recorded in the request log.
    pub logged_size: u64,
}

/// Serve one accepted connection to completion.
pub async fn handle_connection(
    ctx: Arc<ServerContext>,
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
) {
    let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
    async move {
        let mut conn = Connection::new(guard.id(), peer);
        serve(&ctx, stream, &mut conn).await;
        conn.advance(ConnectionState::Closed);
        drop(guard);
    }
    .instrument(span)
    .await
}

async fn serve(ctx: &ServerContext, mut stream: TcpStream, conn: &mut Connection) {
    let start = Instant::now();
    let config = ctx.config();

    let mut buf = vec![0u8; config.listener.max_request_bytes];
    let n = match timeout(config.timeouts.client_read(), stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => n,
        Ok(Ok(_)) => return,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Client read failed");
            return;
        }
        Err(_) => {
            tracing::debug!("Client sent nothing before timeout");
            return;
        }
    };

    conn.advance(ConnectionState::Parsing);
    let request = match ProxyRequest::parse(&buf[..n]) {
        Ok(request) => request,
        Err(e) => {
            // Malformed requests get no response and no log entry.
            tracing::debug!(error = %e, "Malformed request, closing");
            metrics::record_malformed();
            return;
        }
    };

    let reply = process(ctx, &request, conn).await;

    log_request(ctx, conn.peer().ip(), &request, &reply).await;
    metrics::record_request(&request.method, reply.status, reply.outcome.label(), start);

    conn.advance(ConnectionState::Responding);
    if let Err(e) = stream.write_all(&reply.bytes).await {
        tracing::debug!(error = %e, "Client went away before the response was sent");
        return;
    }
    let _ = stream.shutdown().await;
}

/// Decide how to answer `request`: blocked, from cache, or via the origin.
pub async fn process(ctx: &ServerContext, request: &ProxyRequest, conn: &mut Connection) -> Reply {
    if ctx.blocklist.contains(&request.host) {
        tracing::info!(host = %request.host, "Blocked request");
        metrics::record_blocked();
        conn.advance(ConnectionState::Blocked);
        return Reply {
            outcome: Outcome::Blocked,
            status: 403,
            bytes: response::blocked(&request.host),
            logged_size: 0,
        };
    }

    if request.is_cacheable_method() && ctx.cache_enabled() {
        let cached = ctx.cache.lookup(&request.target);
        metrics::record_cache_lookup(cached.is_some());
        if let Some(cached) = cached {
            tracing::debug!(url = %request.target, "Cache hit");
            conn.advance(ConnectionState::CacheHit);
            return Reply {
                outcome: Outcome::CacheHit,
                status: 200,
                logged_size: cached.size() as u64,
                bytes: cached.data.clone(),
            };
        }
        tracing::debug!(url = %request.target, "Cache miss");
    }

    conn.advance(ConnectionState::Forwarding);
    let forwarder = Forwarder::from_config(&ctx.config().timeouts);
    match forwarder.forward(&request.host, request.port, &request.raw).await {
        Ok(bytes) => {
            let status = response::extract_status_code(&bytes);
            if request.is_cacheable_method() && status == 200 {
                store_in_cache(ctx, &request.target, &bytes).await;
            }
            Reply {
                outcome: Outcome::Forwarded,
                status,
                logged_size: bytes.len() as u64,
                bytes,
            }
        }
        Err(e) => {
            tracing::warn!(host = %request.host, port = request.port, error = %e, "Forwarding failed");
            metrics::record_upstream_error(e.kind());
            Reply {
                status: e.status(),
                bytes: e.to_response(),
                logged_size: 0,
                outcome: Outcome::GatewayError(e),
            }
        }
    }
}

async fn store_in_cache(ctx: &ServerContext, target: &str, bytes: &[u8]) {
    match ctx.cache.store(target, bytes.to_vec()).await {
        Ok(true) => tracing::debug!(url = %target, "Response cached"),
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(url = %target, error = %e, "Failed to cache response");
            metrics::record_store_error("cache");
        }
    }
}

async fn log_request(ctx: &ServerContext, client_ip: IpAddr, request: &ProxyRequest, reply: &Reply) {
    let entry = LogEntry::now(
        client_ip.to_string(),
        request.method.as_str(),
        request.target.as_str(),
        reply.status,
        reply.logged_size,
    );
    if let Err(e) = ctx.history.append(entry).await {
        tracing::warn!(error = %e, "Failed to record request");
        metrics::record_store_error("request_log");
    }
}
