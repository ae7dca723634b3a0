//! HTTP/1.x proxying subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (accept loop, one task per connection)
//!     → handler.rs (pipeline for a single connection)
//!         → request.rs (request line, destination host/port)
//!         → security::Blocklist (403 on match)
//!         → cache::ResponseCache (GET only, when enabled)
//!         → forward.rs (one-shot origin connection, buffered reply)
//!         → response.rs (synthesized pages, status / content-type peeks)
//!         → history::RequestLog
//!     → Bytes written to client, socket closed
//! ```

pub mod forward;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use request::{ParseError, ProxyRequest};
pub use server::ProxyServer;
