//! SQLite persistence for the request log, response cache and blocklist.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CachedResponse;
use crate::history::LogEntry;
use crate::storage::StoreError;

/// Handle to the proxy database. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // An in-memory database lives and dies with its connection.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await?
        };

        Self::create_tables(&pool).await?;
        tracing::info!(url = %url, "Database ready");
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                client_ip TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                response_size INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                url TEXT PRIMARY KEY,
                response_data BLOB NOT NULL,
                timestamp TEXT NOT NULL,
                content_type TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS blocked_domains (domain TEXT PRIMARY KEY)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // --- request_logs ---

    /// Append a log row, returning its id.
    pub async fn insert_log(&self, entry: &LogEntry) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO request_logs (timestamp, client_ip, method, url, status_code, response_size)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.timestamp)
        .bind(&entry.client_ip)
        .bind(&entry.method)
        .bind(&entry.url)
        .bind(i64::from(entry.status_code))
        .bind(entry.response_size as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn count_logs(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM request_logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Most recent log rows, newest first.
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, client_ip, method, url, status_code, response_size
            FROM request_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<LogEntry, StoreError> {
                Ok(LogEntry {
                    timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                    client_ip: row.try_get("client_ip")?,
                    method: row.try_get("method")?,
                    url: row.try_get("url")?,
                    status_code: row.try_get::<i64, _>("status_code")?.clamp(0, u16::MAX as i64) as u16,
                    response_size: row.try_get::<i64, _>("response_size")?.max(0) as u64,
                })
            })
            .collect()
    }

    // --- cache ---

    /// Insert or replace the cache row for `entry.url`.
    pub async fn upsert_cache(&self, entry: &CachedResponse) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache (url, response_data, timestamp, content_type)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&entry.url)
        .bind(entry.data.as_slice())
        .bind(entry.captured_at)
        .bind(&entry.content_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_cache(&self) -> Result<Vec<CachedResponse>, StoreError> {
        let rows = sqlx::query("SELECT url, response_data, timestamp, content_type FROM cache")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<CachedResponse, StoreError> {
                Ok(CachedResponse {
                    url: row.try_get("url")?,
                    data: row.try_get("response_data")?,
                    captured_at: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                    content_type: row.try_get("content_type")?,
                })
            })
            .collect()
    }

    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cache").execute(&self.pool).await?;
        Ok(())
    }

    // --- blocked_domains ---

    pub async fn insert_blocked(&self, domain: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO blocked_domains (domain) VALUES (?)")
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_blocked(&self, domain: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blocked_domains WHERE domain = ?")
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn load_blocked(&self) -> Result<Vec<String>, StoreError> {
        let domains: Vec<String> = sqlx::query_scalar("SELECT domain FROM blocked_domains")
            .fetch_all(&self.pool)
            .await?;
        Ok(domains)
    }
}
