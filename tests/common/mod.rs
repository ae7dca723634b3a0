//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use forward_proxy::admin::ControlServer;
use forward_proxy::config::ProxyConfig;
use forward_proxy::context::ServerContext;
use forward_proxy::http::ProxyServer;
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::net::Listener;

/// A mock origin that reads the request, writes `response` and closes.
///
/// Returns its address and a counter of accepted connections.
pub async fn start_origin(response: &'static [u8]) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, accepted)
}

/// A mock origin that accepts, leaves the request unread and closes, which
/// resets the connection.
pub async fn start_resetting_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                drop(socket);
            });
        }
    });
    addr
}

/// A listener whose accept queue is full, so new connects go unanswered.
pub struct SaturatedListener {
    pub addr: SocketAddr,
    _listener: TcpListener,
    _backlog: Vec<TcpStream>,
}

pub async fn saturated_listener() -> SaturatedListener {
    let socket = tokio::net::TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut backlog = Vec::new();
    for _ in 0..4 {
        if let Ok(Ok(stream)) = tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(addr)).await {
            backlog.push(stream);
        }
    }

    SaturatedListener {
        addr,
        _listener: listener,
        _backlog: backlog,
    }
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn memory_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.storage.database_url = "sqlite::memory:".into();
    config.timeouts.connect_secs = 2;
    config.timeouts.read_secs = 2;
    config.timeouts.client_read_secs = 2;
    config
}

pub struct TestProxy {
    pub addr: SocketAddr,
    pub ctx: Arc<ServerContext>,
    pub shutdown: Shutdown,
    pub server: tokio::task::JoinHandle<()>,
}

/// Start a proxy on an ephemeral port backed by an in-memory database.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = ServerContext::open(config).await.unwrap();
    let shutdown = Shutdown::new();

    let server = ProxyServer::new(ctx.clone());
    let rx = shutdown.subscribe();
    let server = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });
    while !ctx.is_running() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    TestProxy {
        addr,
        ctx,
        shutdown,
        server,
    }
}

/// Serve the control socket for `proxy` on an ephemeral port.
pub async fn start_control(proxy: &TestProxy) -> String {
    let control = ControlServer::bind(proxy.ctx.clone(), "127.0.0.1:0").await.unwrap();
    let addr = control.local_addr().unwrap().to_string();
    tokio::spawn(control.run(proxy.shutdown.subscribe()));
    addr
}

/// Send `request` through the proxy and read until it closes the connection.
pub async fn send_raw(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

/// A GET for `path` on `origin`, in absolute form.
pub fn get_request(origin: SocketAddr, path: &str) -> Vec<u8> {
    format!("GET http://{origin}{path} HTTP/1.1\r\nHost: {origin}\r\n\r\n").into_bytes()
}
