//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limit permit)
//!     → connection.rs (id, pipeline state, in-flight tracking)
//!     → Hand off to http::handler
//! ```

pub mod connection;
pub mod listener;

pub use connection::{Connection, ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
