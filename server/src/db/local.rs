//! Local staging table (SQLite).
//!
//! Absorbs all click traffic without touching the network. Rows hold only
//! the clicks that have not been merged into the remote table yet.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tally_engine::{Count, CounterRecord, RemovalReport, RowAction, Settlement, UserId};

use super::{LocalStoreError, RowLocks};
use crate::sync::LocalCounters;

/// A stored counter row from the local table.
#[derive(Debug)]
pub struct StoredCounter {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub count: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for StoredCounter {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredCounter {
            user_id: row.try_get("user_id")?,
            display_name: row.try_get("display_name")?,
            count: row.try_get("count")?,
        })
    }
}

impl StoredCounter {
    /// Convert database row to an engine record.
    pub fn into_record(self) -> CounterRecord {
        CounterRecord::new(self.user_id, self.display_name, self.count)
    }
}

/// Handle to the local staging table.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    locks: Arc<RowLocks>,
}

impl LocalStore {
    /// Open the local database, creating the file if needed.
    ///
    /// In-memory URLs get a single long-lived connection so every caller
    /// sees the same database.
    pub async fn connect(database_url: &str) -> Result<Self, LocalStoreError> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Arc::new(RowLocks::new()),
        }
    }

    /// Create the table if it does not exist. Safe to run repeatedly.
    pub async fn ensure_schema(&self) -> Result<(), LocalStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                user_id INTEGER PRIMARY KEY,
                display_name TEXT,
                count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Add one click, creating the row at 1 if absent.
    pub async fn increment(&self, user_id: UserId) -> Result<Count, LocalStoreError> {
        let _row = self.locks.acquire(user_id).await;

        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO clicks (user_id, count)
            VALUES (?1, 1)
            ON CONFLICT (user_id) DO UPDATE SET count = clicks.count + 1
            RETURNING count
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Return the staged count, creating the row at 0 if absent.
    ///
    /// The display name is recorded on creation, or when the row was created
    /// by a click and has none yet.
    pub async fn read_or_init(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> Result<Count, LocalStoreError> {
        let _row = self.locks.acquire(user_id).await;

        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO clicks (user_id, display_name, count)
            VALUES (?1, ?2, 0)
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = COALESCE(clicks.display_name, excluded.display_name)
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Get a single row.
    pub async fn get(&self, user_id: UserId) -> Result<Option<CounterRecord>, LocalStoreError> {
        let stored = sqlx::query_as::<_, StoredCounter>(
            r#"
            SELECT user_id, display_name, count
            FROM clicks
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored.map(StoredCounter::into_record))
    }

    /// Up to `n` rows, highest count first, ties by user id.
    pub async fn top_n(&self, n: usize) -> Result<Vec<CounterRecord>, LocalStoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);

        let stored = sqlx::query_as::<_, StoredCounter>(
            r#"
            SELECT user_id, display_name, count
            FROM clicks
            ORDER BY count DESC, user_id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(stored.into_iter().map(StoredCounter::into_record).collect())
    }

    /// Every staged row, highest count first.
    pub async fn list_all(&self) -> Result<Vec<CounterRecord>, LocalStoreError> {
        let stored = sqlx::query_as::<_, StoredCounter>(
            r#"
            SELECT user_id, display_name, count
            FROM clicks
            ORDER BY count DESC, user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(stored.into_iter().map(StoredCounter::into_record).collect())
    }

    /// Settle rows whose counts were merged into the remote table.
    ///
    /// A row still at the merged count is deleted; a row that received
    /// clicks since the snapshot only has the merged amount subtracted.
    pub async fn remove(&self, settlements: &[Settlement]) -> Result<RemovalReport, LocalStoreError> {
        let mut removal = RemovalReport::default();

        for settlement in settlements {
            let _row = self.locks.acquire(settlement.user_id).await;

            let current: Option<(i64,)> =
                sqlx::query_as(r#"SELECT count FROM clicks WHERE user_id = ?1"#)
                    .bind(settlement.user_id)
                    .fetch_optional(&self.pool)
                    .await?;

            let action = settlement.plan(current.map(|(count,)| count));
            match action {
                RowAction::Delete => {
                    sqlx::query(r#"DELETE FROM clicks WHERE user_id = ?1 AND count = ?2"#)
                        .bind(settlement.user_id)
                        .bind(settlement.merged)
                        .execute(&self.pool)
                        .await?;
                }
                RowAction::Subtract(delta) => {
                    sqlx::query(r#"UPDATE clicks SET count = count - ?2 WHERE user_id = ?1"#)
                        .bind(settlement.user_id)
                        .bind(delta)
                        .execute(&self.pool)
                        .await?;
                }
                RowAction::Gone => {}
            }

            tracing::debug!(user_id = settlement.user_id, ?action, "Settled local row");
            removal.record(action);
        }

        Ok(removal)
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LocalCounters for LocalStore {
    async fn top_n(&self, n: usize) -> Result<Vec<CounterRecord>, LocalStoreError> {
        LocalStore::top_n(self, n).await
    }

    async fn remove(&self, settlements: &[Settlement]) -> Result<RemovalReport, LocalStoreError> {
        LocalStore::remove(self, settlements).await
    }
}
