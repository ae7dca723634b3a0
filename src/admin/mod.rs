//! Monitoring and administration boundary.
//!
//! Read-only views (stats, cache breakdown, recent requests) and mutators
//! (block/unblock, clear cache, toggle cache) over a running or offline
//! [`ServerContext`](crate::context::ServerContext).
//!
//! # Data Flow
//! ```text
//! proxy-cli
//!     → control.rs (JSON lines over the local control socket)
//!     → handlers.rs against the running proxy's context
//!
//! proxy-cli, no proxy listening:
//!     → handlers.rs against a context opened on the database
//! ```

pub mod control;
pub mod handlers;

pub use control::{ControlClient, ControlError, ControlRequest, ControlResponse, ControlServer};
pub use handlers::*;
