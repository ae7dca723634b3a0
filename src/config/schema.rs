//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Domains blocked at startup and on reload.
    pub blocklist: BlocklistConfig,

    /// Durable store settings.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Control socket used by `proxy-cli`.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Size of the single initial read from the client. Request line plus
    /// headers beyond this are truncated.
    pub max_request_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 10_000,
            max_request_bytes: 4096,
        }
    }
}

/// Timeout configuration for client and origin I/O.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Origin connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-read timeout while buffering the origin response, in seconds.
    pub read_secs: u64,

    /// How long to wait for the client's first bytes, in seconds.
    pub client_read_secs: u64,

    /// Best-effort wait for in-flight handlers after the listener closes.
    pub drain_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn client_read(&self) -> Duration {
        Duration::from_secs(self.client_read_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            read_secs: 10,
            client_read_secs: 30,
            drain_secs: 5,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store GET responses.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Blocklist seed configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BlocklistConfig {
    /// Exact host names to deny. Merged into the persisted blocklist.
    pub domains: Vec<String>,
}

/// Durable storage configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite connection URL (e.g., "sqlite://proxy.db" or "sqlite::memory:").
    pub database_url: String,

    /// Number of log entries mirrored in memory.
    pub recent_log_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://proxy.db".to_string(),
            recent_log_capacity: 1000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Control socket configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve admin commands to a local `proxy-cli`.
    pub control_enabled: bool,

    /// Control socket bind address. Keep it on loopback; it is unauthenticated.
    pub control_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            control_enabled: true,
            control_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.max_request_bytes, 4096);
        assert_eq!(config.timeouts.connect(), Duration::from_secs(5));
        assert_eq!(config.timeouts.read(), Duration::from_secs(10));
        assert!(config.cache.enabled);
        assert!(config.blocklist.domains.is_empty());
        assert_eq!(config.storage.recent_log_capacity, 1000);
        assert!(config.admin.control_enabled);
        assert_eq!(config.admin.control_address, "127.0.0.1:8081");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [cache]
            enabled = false

            [blocklist]
            domains = ["ads.example.com"]
            "#,
        )
        .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.blocklist.domains, vec!["ads.example.com".to_string()]);
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.timeouts.read_secs, 10);
    }
}
