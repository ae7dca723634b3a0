use serde::Serialize;

use crate::cache::{CacheStats, CachedUrl};
use crate::context::ServerContext;
use crate::history::LogEntry;
use crate::storage::StoreError;

/// Default page size for [`get_recent_logs`].
pub const DEFAULT_LOG_LIMIT: usize = 50;

#[derive(Debug, Serialize)]
pub struct ProxyStats {
    pub total_requests: u64,
    pub cached_items: usize,
    pub blocked_domains: usize,
    pub is_running: bool,
    pub server_address: String,
}

pub async fn get_stats(ctx: &ServerContext) -> Result<ProxyStats, StoreError> {
    Ok(ProxyStats {
        total_requests: ctx.history.total().await?,
        cached_items: ctx.cache.len(),
        blocked_domains: ctx.blocklist.len(),
        is_running: ctx.is_running(),
        server_address: ctx.server_address(),
    })
}

pub fn get_cache_stats(ctx: &ServerContext) -> CacheStats {
    ctx.cache.stats()
}

/// Up to `limit` requests, newest first.
pub async fn get_recent_logs(ctx: &ServerContext, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
    ctx.history.recent(limit).await
}

/// Every cached target, newest capture first.
pub fn get_cached_urls(ctx: &ServerContext) -> Vec<CachedUrl> {
    ctx.cache.urls()
}

pub async fn add_blocked_domain(ctx: &ServerContext, domain: &str) -> Result<(), StoreError> {
    ctx.blocklist.add(domain.trim()).await
}

pub async fn remove_blocked_domain(ctx: &ServerContext, domain: &str) -> Result<(), StoreError> {
    ctx.blocklist.remove(domain.trim()).await
}

/// Blocked domains, sorted.
pub fn list_blocked_domains(ctx: &ServerContext) -> Vec<String> {
    ctx.blocklist.domains()
}

pub async fn clear_cache(ctx: &ServerContext) -> Result<(), StoreError> {
    ctx.cache.clear().await
}

pub fn set_cache_enabled(ctx: &ServerContext, enabled: bool) {
    ctx.set_cache_enabled(enabled);
}

const DEMO_RESPONSES: [(&str, &str); 4] = [
    (
        "http://example.com/test1",
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><body><h1>Test Page 1</h1></body></html>",
    ),
    (
        "http://example.com/test2",
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"message\": \"Test JSON data\", \"status\": \"success\"}",
    ),
    (
        "http://test.com/data",
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nThis is test plain text content for caching demonstration.",
    ),
    (
        "http://demo.org/api/info",
        "HTTP/1.1 200 OK\r\nContent-Type: application/xml\r\n\r\n<response><status>success</status><data>Test XML data</data></response>",
    ),
];

/// Populate the cache with four sample responses of different content types.
///
/// Writes regardless of the enabled flag.
pub async fn seed_demo_cache(ctx: &ServerContext) -> Result<usize, StoreError> {
    for (url, response) in DEMO_RESPONSES {
        ctx.cache.put(url, response.as_bytes().to_vec()).await?;
    }
    tracing::info!(count = DEMO_RESPONSES.len(), "Seeded demo cache entries");
    Ok(DEMO_RESPONSES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use std::sync::Arc;

    async fn context() -> Arc<ServerContext> {
        let mut config = ProxyConfig::default();
        config.storage.database_url = "sqlite::memory:".into();
        ServerContext::open(config).await.unwrap()
    }

    #[tokio::test]
    async fn stats_reflect_stores() {
        let ctx = context().await;
        add_blocked_domain(&ctx, "ads.test").await.unwrap();
        seed_demo_cache(&ctx).await.unwrap();
        ctx.history
            .append(LogEntry::now("127.0.0.1", "GET", "http://a.test/", 200, 10))
            .await
            .unwrap();

        let stats = get_stats(&ctx).await.unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.cached_items, 4);
        assert_eq!(stats.blocked_domains, 1);
        assert!(!stats.is_running);
        assert_eq!(stats.server_address, "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn demo_cache_covers_four_content_types() {
        let ctx = context().await;
        seed_demo_cache(&ctx).await.unwrap();

        let stats = get_cache_stats(&ctx);
        assert_eq!(stats.total_cached, 4);
        let types: Vec<&str> = stats.cache_by_type.iter().map(|t| t.content_type.as_str()).collect();
        assert_eq!(types, vec!["application/json", "application/xml", "text/html", "text/plain"]);
        assert!(stats.cache_by_type.iter().all(|t| t.count == 1));
    }

    #[tokio::test]
    async fn unblock_restores_previous_list() {
        let ctx = context().await;
        add_blocked_domain(&ctx, "b.test").await.unwrap();
        let before = list_blocked_domains(&ctx);

        add_blocked_domain(&ctx, "a.test").await.unwrap();
        assert_eq!(list_blocked_domains(&ctx), vec!["a.test", "b.test"]);

        remove_blocked_domain(&ctx, "a.test").await.unwrap();
        assert_eq!(list_blocked_domains(&ctx), before);
    }

    #[tokio::test]
    async fn clear_cache_empties_store_and_urls() {
        let ctx = context().await;
        seed_demo_cache(&ctx).await.unwrap();
        assert_eq!(get_cached_urls(&ctx).len(), 4);

        clear_cache(&ctx).await.unwrap();
        assert!(get_cached_urls(&ctx).is_empty());
        assert_eq!(get_cache_stats(&ctx).total_cached, 0);
    }

    #[tokio::test]
    async fn toggling_cache_keeps_entries() {
        let ctx = context().await;
        seed_demo_cache(&ctx).await.unwrap();

        set_cache_enabled(&ctx, false);
        assert!(ctx.cache.lookup("http://test.com/data").is_none());
        set_cache_enabled(&ctx, true);
        assert!(ctx.cache.lookup("http://test.com/data").is_some());
    }

    #[tokio::test]
    async fn repeated_mutations_are_no_ops() {
        let ctx = context().await;
        add_blocked_domain(&ctx, " a.test ").await.unwrap();
        add_blocked_domain(&ctx, "a.test").await.unwrap();
        assert_eq!(list_blocked_domains(&ctx), vec!["a.test"]);

        remove_blocked_domain(&ctx, "missing.test").await.unwrap();
        remove_blocked_domain(&ctx, "a.test").await.unwrap();
        remove_blocked_domain(&ctx, "a.test").await.unwrap();
        assert!(list_blocked_domains(&ctx).is_empty());
    }
}
