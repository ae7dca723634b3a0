//! Response cache store.
//!
//! A `DashMap` mirror over the durable `cache` table. Readers never block on
//! writers; writes are serialized so the table and the mirror agree on the
//! last value for every key.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::{CacheStats, CachedResponse, CachedUrl, ContentTypeStats};
use crate::storage::{Database, StoreError};

/// Cache of raw origin responses keyed by exact request target.
pub struct ResponseCache {
    entries: DashMap<String, Arc<CachedResponse>>,
    database: Database,
    enabled: AtomicBool,
    writes: Mutex<()>,
}

impl ResponseCache {
    /// Load every persisted entry.
    pub async fn load(database: Database, enabled: bool) -> Result<Self, StoreError> {
        let entries = DashMap::new();
        for entry in database.load_cache().await? {
            entries.insert(entry.url.clone(), Arc::new(entry));
        }
        tracing::info!(count = entries.len(), enabled, "Loaded response cache");
        Ok(Self {
            entries,
            database,
            enabled: AtomicBool::new(enabled),
            writes: Mutex::new(()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turning the cache off hides entries without removing them.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            tracing::info!(enabled, "Response cache toggled");
        }
    }

    /// Entry for `target` if the cache is enabled.
    pub fn lookup(&self, target: &str) -> Option<Arc<CachedResponse>> {
        if !self.is_enabled() {
            return None;
        }
        self.get(target)
    }

    /// Entry for `target` regardless of the enabled flag.
    pub fn get(&self, target: &str) -> Option<Arc<CachedResponse>> {
        self.entries.get(target).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `data` for `target` if the cache is enabled. Returns whether it
    /// was stored.
    pub async fn store(&self, target: &str, data: Vec<u8>) -> Result<bool, StoreError> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.put(target, data).await?;
        Ok(true)
    }

    /// Unconditionally insert or overwrite the entry for `target`.
    pub async fn put(&self, target: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let entry = CachedResponse::capture(target, data);
        let _write = self.writes.lock().await;
        self.database.upsert_cache(&entry).await?;
        tracing::debug!(url = %target, content_type = %entry.content_type, size = entry.size(), "Cached response");
        self.entries.insert(entry.url.clone(), Arc::new(entry));
        Ok(())
    }

    /// Remove every entry, whether or not the cache is enabled.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _write = self.writes.lock().await;
        self.database.clear_cache().await?;
        self.entries.clear();
        tracing::info!("Cache cleared");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count, size and per-content-type breakdown, computed by a full scan.
    pub fn stats(&self) -> CacheStats {
        let mut total_bytes = 0usize;
        let mut by_type: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for entry in self.entries.iter() {
            let size = entry.size();
            total_bytes += size;
            let slot = by_type.entry(entry.content_type.clone()).or_default();
            slot.0 += 1;
            slot.1 += size;
        }

        CacheStats {
            total_cached: self.entries.len(),
            cache_size_kb: (total_bytes as f64 / 1024.0 * 100.0).round() / 100.0,
            cache_by_type: by_type
                .into_iter()
                .map(|(content_type, (count, size))| ContentTypeStats {
                    content_type,
                    count,
                    size,
                })
                .collect(),
        }
    }

    /// Every cached target, newest capture first.
    pub fn urls(&self) -> Vec<CachedUrl> {
        let mut urls: Vec<CachedUrl> = self
            .entries
            .iter()
            .map(|entry| CachedUrl {
                url: entry.url.clone(),
                content_type: entry.content_type.clone(),
                timestamp: entry.captured_at,
                size: entry.size(),
            })
            .collect();
        urls.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.url.cmp(&b.url)));
        urls
    }
}
