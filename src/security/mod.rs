//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request:
//!     → blocklist.rs (exact host match)
//!     → blocked: 403, logged, no cache or origin access
//!     → allowed: continue to cache / forwarding
//! ```

pub mod blocklist;

pub use blocklist::Blocklist;
