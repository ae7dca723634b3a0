//! Exact-match domain blocklist.
//!
//! Lookups hit a concurrent in-memory set and never wait on mutations.
//! Mutations are serialized, persisted first, then applied to the set, so a
//! change is visible to the next check from any handler.

use dashmap::DashSet;
use tokio::sync::Mutex;

use crate::storage::{Database, StoreError};

/// Host names denied forwarding. No wildcard or suffix matching.
pub struct Blocklist {
    domains: DashSet<String>,
    database: Database,
    writes: Mutex<()>,
}

impl Blocklist {
    /// Load the persisted blocklist.
    pub async fn load(database: Database) -> Result<Self, StoreError> {
        let domains = DashSet::new();
        for domain in database.load_blocked().await? {
            domains.insert(domain);
        }
        tracing::info!(count = domains.len(), "Loaded blocked domains");
        Ok(Self {
            domains,
            database,
            writes: Mutex::new(()),
        })
    }

    /// Whether `host` is blocked. Case-sensitive exact match.
    pub fn contains(&self, host: &str) -> bool {
        self.domains.contains(host)
    }

    /// Block `domain`. Adding a blocked domain again is a no-op.
    pub async fn add(&self, domain: &str) -> Result<(), StoreError> {
        let _write = self.writes.lock().await;
        self.database.insert_blocked(domain).await?;
        if self.domains.insert(domain.to_string()) {
            tracing::info!(domain = %domain, "Domain blocked");
        }
        Ok(())
    }

    /// Unblock `domain`. Removing an absent domain is a no-op.
    pub async fn remove(&self, domain: &str) -> Result<(), StoreError> {
        let _write = self.writes.lock().await;
        self.database.delete_blocked(domain).await?;
        if self.domains.remove(domain).is_some() {
            tracing::info!(domain = %domain, "Domain unblocked");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// All blocked domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.domains.iter().map(|d| d.key().clone()).collect();
        domains.sort();
        domains
    }
}
