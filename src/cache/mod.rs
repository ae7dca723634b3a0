//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET request, cache enabled:
//!     → store.rs lookup by exact target string
//!     → hit: relay stored bytes, no origin contact
//!     → miss: forward; a 200 response is stored under the same target
//! ```
//!
//! Keys are the raw request target: case-sensitive, query string untouched,
//! no normalization.

pub mod store;

pub use store::ResponseCache;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::response::extract_content_type;

/// A stored origin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Request target the response was captured for.
    pub url: String,
    /// The raw response, status line included.
    pub data: Vec<u8>,
    /// Extracted from the headers, or "unknown".
    pub content_type: String,
    pub captured_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Capture `data` for `url` now, deriving its content type.
    pub fn capture(url: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            content_type: extract_content_type(&data),
            data,
            captured_at: Utc::now(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_cached: usize,
    pub cache_size_kb: f64,
    pub cache_by_type: Vec<ContentTypeStats>,
}

/// Entries and bytes stored for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentTypeStats {
    pub content_type: String,
    pub count: usize,
    pub size: usize,
}

/// Listing row for one cached target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedUrl {
    pub url: String,
    pub content_type: String,
    pub timestamp: DateTime<Utc>,
    pub size: usize,
}
