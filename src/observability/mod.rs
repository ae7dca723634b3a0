//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and stores produce:
//!     → logging.rs (structured tracing events, the operator diagnostic channel)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
