use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use shared_types::SessionState;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::store::{SessionStore, StoreError};

/// SQLite-backed interview session store.
///
/// Schema (created by the embedded migrations):
/// ```sql
/// CREATE TABLE IF NOT EXISTS report_sessions (
///     conversation_id TEXT    PRIMARY KEY,
///     data            TEXT    NOT NULL,   -- SessionState as JSON
///     expiry_date     INTEGER NOT NULL    -- Unix timestamp (seconds)
/// );
/// ```
///
/// Expiry slides: every `save` pushes `expiry_date` to now + `ttl`. Expired
/// rows are invisible to `load` and removed by [`run_expired_session_cleanup`].
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Delete all rows whose expiry_date is in the past.
    pub async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now().timestamp();
        let deleted = sqlx::query("DELETE FROM report_sessions WHERE expiry_date <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    fn expiry_from_now(&self) -> i64 {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        Utc::now().timestamp().saturating_add(ttl)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<SessionState>, StoreError> {
        let now = Utc::now().timestamp();

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM report_sessions WHERE conversation_id = ? AND expiry_date > ?",
        )
        .bind(conversation_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some((data_json,)) => Ok(Some(serde_json::from_str(&data_json)?)),
        }
    }

    async fn save(&self, conversation_id: &str, session: &SessionState) -> Result<(), StoreError> {
        let data = serde_json::to_string(session)?;
        let expiry = self.expiry_from_now();

        sqlx::query(
            "INSERT INTO report_sessions (conversation_id, data, expiry_date) VALUES (?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET data = excluded.data, expiry_date = excluded.expiry_date",
        )
        .bind(conversation_id)
        .bind(&data)
        .bind(expiry)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM report_sessions WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Background task: delete expired sessions every `period`.
pub async fn run_expired_session_cleanup(store: SqliteSessionStore, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // first tick is immediate; skip it
    loop {
        interval.tick().await;
        match store.delete_expired().await {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, "expired report sessions removed"),
            Err(e) => error!("session cleanup failed: {e}"),
        }
    }
}
