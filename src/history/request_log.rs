//! Append-only request log with a bounded in-memory tail.

use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::history::LogEntry;
use crate::storage::{Database, StoreError};

/// Durable request log plus a ring of the newest entries.
///
/// The ring lock is held across the durable insert, so concurrent appends
/// land in the same order in both places.
pub struct RequestLog {
    recent: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    database: Database,
}

impl RequestLog {
    /// Open the log, priming the ring with the newest persisted rows.
    pub async fn load(database: Database, capacity: usize) -> Result<Self, StoreError> {
        let capacity = capacity.max(1);
        // Rows come back newest first; the ring is oldest first.
        let recent: VecDeque<LogEntry> = database.recent_logs(capacity).await?.into_iter().rev().collect();
        Ok(Self {
            recent: Mutex::new(recent),
            capacity,
            database,
        })
    }

    /// Append `entry` durably, then to the ring, evicting the oldest entry
    /// once the ring is full.
    pub async fn append(&self, entry: LogEntry) -> Result<(), StoreError> {
        let mut recent = self.recent.lock().await;
        self.database.insert_log(&entry).await?;
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(entry);
        Ok(())
    }

    /// Up to `limit` entries, newest first.
    ///
    /// Served from the ring when it can hold `limit` entries, otherwise from
    /// the durable log.
    pub async fn recent(&self, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        if limit <= self.capacity {
            let recent = self.recent.lock().await;
            return Ok(recent.iter().rev().take(limit).cloned().collect());
        }
        self.database.recent_logs(limit).await
    }

    /// Total entries ever logged, from the durable log.
    pub async fn total(&self) -> Result<u64, StoreError> {
        self.database.count_logs().await
    }
}
