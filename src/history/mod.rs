//! Request history subsystem.
//!
//! Every answered request (blocked, cache hit, forwarded, synthesized error)
//! is appended to the durable `request_logs` table and mirrored in a bounded
//! in-memory ring holding the most recent entries.

pub mod request_log;

pub use request_log::RequestLog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One answered request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub method: String,
    /// Request target as sent by the client.
    pub url: String,
    pub status_code: u16,
    /// Bytes relayed to the client; 0 for synthesized responses.
    pub response_size: u64,
}

impl LogEntry {
    /// Entry stamped with the current time.
    pub fn now(
        client_ip: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        status_code: u16,
        response_size: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            client_ip: client_ip.into(),
            method: method.into(),
            url: url.into(),
            status_code,
            response_size,
        }
    }
}
