//! Proxy acceptor.
//!
//! # Responsibilities
//! - Accept client connections one at a time
//! - Spawn an independent handler task per connection without awaiting it
//! - Stop accepting and close the listening socket on shutdown
//!
//! In-flight handlers are left to finish on their own; see
//! [`ConnectionTracker::wait_for_drain`](crate::net::ConnectionTracker::wait_for_drain).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::context::ServerContext;
use crate::http::handler::handle_connection;
use crate::net::{Listener, ListenerError};

/// The forward proxy's accept loop.
pub struct ProxyServer {
    ctx: Arc<ServerContext>,
}

impl ProxyServer {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    ///
    /// The listener is dropped, closing the socket, before this returns.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        self.ctx.set_local_addr(addr);
        self.ctx.set_running(true);
        tracing::info!(address = %addr, "Proxy server accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, closing listener");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let ctx = Arc::clone(&self.ctx);
                        let guard = ctx.connections.track();
                        tokio::spawn(async move {
                            handle_connection(ctx, stream, peer, guard).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }

        drop(listener);
        self.ctx.set_running(false);
        tracing::info!(
            in_flight = self.ctx.connections.active_count(),
            "Proxy server stopped accepting"
        );
        Ok(())
    }
}
