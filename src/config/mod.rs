//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → held in an ArcSwap by the server context
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → ServerContext::apply_config swaps it in
//! ```
//!
//! All fields have defaults, so an empty file is a valid config.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, BlocklistConfig, CacheConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    StorageConfig, TimeoutConfig,
};
pub use loader::{load_config, load_or_default, parse_config, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
