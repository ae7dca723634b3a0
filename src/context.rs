//! Shared server context.
//!
//! One instance per process, shared by reference (`Arc`) with the acceptor,
//! every connection handler and the monitoring functions. Each collaborator
//! synchronizes on its own, so a cache read never waits on a log write.

use arc_swap::{ArcSwap, ArcSwapOption};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::ProxyConfig;
use crate::history::RequestLog;
use crate::net::ConnectionTracker;
use crate::security::Blocklist;
use crate::storage::{Database, StoreError};

pub struct ServerContext {
    config: ArcSwap<ProxyConfig>,
    database: Database,
    pub blocklist: Blocklist,
    pub cache: ResponseCache,
    pub history: RequestLog,
    pub connections: ConnectionTracker,
    running: AtomicBool,
    local_addr: ArcSwapOption<SocketAddr>,
}

impl ServerContext {
    /// Connect the database and load every store.
    pub async fn open(config: ProxyConfig) -> Result<Arc<Self>, StoreError> {
        let database = Database::connect(&config.storage.database_url).await?;

        let blocklist = Blocklist::load(database.clone()).await?;
        for domain in &config.blocklist.domains {
            blocklist.add(domain).await?;
        }
        let cache = ResponseCache::load(database.clone(), config.cache.enabled).await?;
        let history = RequestLog::load(database.clone(), config.storage.recent_log_capacity).await?;

        Ok(Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            database,
            blocklist,
            cache,
            history,
            connections: ConnectionTracker::new(),
            running: AtomicBool::new(false),
            local_addr: ArcSwapOption::empty(),
        }))
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ProxyConfig> {
        self.config.load_full()
    }

    /// Swap in a reloaded configuration.
    ///
    /// Applies the cache flag, timeouts and blocklist seeds immediately.
    /// Listener settings only take effect on restart.
    pub async fn apply_config(&self, new: ProxyConfig) {
        let old = self.config.load_full();
        if old.listener.bind_address != new.listener.bind_address
            || old.listener.max_connections != new.listener.max_connections
        {
            tracing::warn!("Listener settings changed; restart required to apply them");
        }
        if old.storage.database_url != new.storage.database_url {
            tracing::warn!("Storage settings changed; restart required to apply them");
        }

        self.cache.set_enabled(new.cache.enabled);
        for domain in &new.blocklist.domains {
            if let Err(e) = self.blocklist.add(domain).await {
                tracing::warn!(domain = %domain, error = %e, "Failed to apply blocked domain from config");
            }
        }
        self.config.store(Arc::new(new));
        tracing::info!("Configuration applied");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    pub fn set_cache_enabled(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
    }

    pub(crate) fn set_local_addr(&self, addr: SocketAddr) {
        self.local_addr.store(Some(Arc::new(addr)));
    }

    /// Address the proxy is listening on, or the configured one before bind.
    pub fn server_address(&self) -> String {
        match self.local_addr.load_full() {
            Some(addr) => addr.to_string(),
            None => self.config().listener.bind_address.clone(),
        }
    }

    /// Close the durable stores. Call once the server has stopped.
    pub async fn close(&self) {
        self.set_running(false);
        self.database.close().await;
        tracing::info!("Stores closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.storage.database_url = "sqlite::memory:".into();
        config
    }

    #[tokio::test]
    async fn open_seeds_blocklist_from_config() {
        let mut config = memory_config();
        config.blocklist.domains = vec!["seeded.test".into()];
        let ctx = ServerContext::open(config).await.unwrap();

        assert!(ctx.blocklist.contains("seeded.test"));
        assert!(!ctx.is_running());
        assert!(ctx.cache_enabled());
        assert_eq!(ctx.server_address(), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn reload_toggles_cache_and_adds_domains() {
        let ctx = ServerContext::open(memory_config()).await.unwrap();

        let mut reloaded = memory_config();
        reloaded.cache.enabled = false;
        reloaded.timeouts.read_secs = 3;
        reloaded.blocklist.domains = vec!["late.test".into()];
        ctx.apply_config(reloaded).await;

        assert!(!ctx.cache_enabled());
        assert!(ctx.blocklist.contains("late.test"));
        assert_eq!(ctx.config().timeouts.read_secs, 3);
    }

    #[tokio::test]
    async fn server_address_prefers_bound_address() {
        let ctx = ServerContext::open(memory_config()).await.unwrap();
        ctx.set_local_addr("127.0.0.1:4321".parse().unwrap());
        assert_eq!(ctx.server_address(), "127.0.0.1:4321");
    }
}
