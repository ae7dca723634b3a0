//! Durable storage subsystem.
//!
//! # Layout
//! ```text
//! request_logs    (id AUTOINCREMENT, append-only)
//! cache           (url PRIMARY KEY)
//! blocked_domains (domain PRIMARY KEY)
//! ```
//!
//! Each in-memory collaborator (blocklist, cache, request log) writes its row
//! here first and updates its own mirror only after the write succeeds.

pub mod database;

pub use database::Database;

use thiserror::Error;

/// Errors raised by the durable stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
