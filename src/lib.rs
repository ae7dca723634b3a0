//! Forward HTTP Proxy Library

pub mod admin;
pub mod cache;
pub mod config;
pub mod context;
pub mod history;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod storage;

pub use config::schema::ProxyConfig;
pub use context::ServerContext;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
