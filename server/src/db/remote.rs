//! Remote counter table (PostgreSQL).
//!
//! Durable source of truth across restarts and instances. Only the
//! reconciliation task writes here, always by addition.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tally_engine::{Count, UserId};

use super::RemoteStoreError;
use crate::sync::RemoteCounters;

/// Handle to the remote table.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    pool: PgPool,
}

impl RemoteStore {
    /// Create a new connection pool for the remote database.
    pub async fn connect(database_url: &str) -> Result<Self, RemoteStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table if it does not exist. Safe against an initialized remote.
    pub async fn ensure_schema(&self) -> Result<(), RemoteStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                user_id BIGINT PRIMARY KEY,
                display_name TEXT,
                count BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the merged total for a user.
    pub async fn get_count(&self, user_id: UserId) -> Result<Option<Count>, RemoteStoreError> {
        let row: Option<(i64,)> = sqlx::query_as(r#"SELECT count FROM clicks WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(count,)| count))
    }

    /// Add `delta` to the user's total, inserting the row if absent.
    ///
    /// The statement commits before this returns. A missing display name
    /// keeps the stored one.
    pub async fn merge_add(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        delta: Count,
    ) -> Result<Count, RemoteStoreError> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO clicks (user_id, display_name, count)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                count = clicks.count + EXCLUDED.count,
                display_name = COALESCE(EXCLUDED.display_name, clicks.display_name)
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RemoteCounters for RemoteStore {
    async fn get_count(&self, user_id: UserId) -> Result<Option<Count>, RemoteStoreError> {
        RemoteStore::get_count(self, user_id).await
    }

    async fn merge_add(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        delta: Count,
    ) -> Result<Count, RemoteStoreError> {
        RemoteStore::merge_add(self, user_id, display_name, delta).await
    }
}
