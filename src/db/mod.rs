//! Database module
//!
//! SQLite implementation of the login statistics stores. Every mutation is a
//! single upsert statement, so concurrent logins never race on a
//! read-modify-write.

#[cfg(test)]
pub mod memory;
mod schema;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::stats::{
    Counter, DailyCounterStore, DailyStat, LoginDedupTracker, StoreError, StoreResult,
    UserDirectory, UserRecord,
};

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.url))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create or update the schema. Safe to run repeatedly.
    pub async fn install(&self) -> Result<()> {
        // Enable WAL mode for better concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(schema::CREATE_DAILY_STATS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_LOGIN_MARKERS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_USERS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop the stats table and every user's login marker. The host's user
    /// table is left alone.
    pub async fn uninstall(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(schema::DROP_DAILY_STATS_TABLE)
            .execute(&mut *tx)
            .await?;
        // Dropping the marker table removes every user's marker
        sqlx::query(schema::DROP_LOGIN_MARKERS_TABLE)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Dropped login stats and user login markers");
        Ok(())
    }
}

fn to_count(amount: u64) -> StoreResult<i64> {
    i64::try_from(amount).map_err(|_| StoreError::AmountOutOfRange(amount))
}

#[async_trait]
impl DailyCounterStore for Database {
    async fn increment(&self, day: NaiveDate, counter: Counter, amount: u64) -> StoreResult<()> {
        let amount = to_count(amount)?;
        let (logins, unique_logins) = match counter {
            Counter::Login => (amount, 0),
            Counter::Unique => (0, amount),
        };

        sqlx::query(
            r#"
            INSERT INTO daily_login_stats (day_date, logins, unique_logins)
            VALUES (?, ?, ?)
            ON CONFLICT(day_date) DO UPDATE SET
                logins = logins + excluded.logins,
                unique_logins = unique_logins + excluded.unique_logins
            "#,
        )
        .bind(day)
        .bind(logins)
        .bind(unique_logins)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyStat>> {
        let rows: Vec<(NaiveDate, i64, i64)> = sqlx::query_as(
            r#"
            SELECT day_date, logins, unique_logins
            FROM daily_login_stats
            WHERE day_date >= ? AND day_date <= ?
            ORDER BY day_date ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, logins, unique_logins)| DailyStat {
                day,
                logins: logins.max(0) as u64,
                unique_logins: unique_logins.max(0) as u64,
            })
            .collect())
    }
}

#[async_trait]
impl LoginDedupTracker for Database {
    async fn mark_and_check(&self, user_id: &str, today: NaiveDate) -> StoreResult<bool> {
        // The conditional upsert only touches a row when the marker moves, so
        // exactly one of several concurrent same-day calls sees a change.
        let result = sqlx::query(
            r#"
            INSERT INTO user_login_markers (user_id, last_login_day)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                last_login_day = excluded.last_login_day
            WHERE user_login_markers.last_login_day <> excluded.last_login_day
            "#,
        )
        .bind(user_id)
        .bind(today)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UserDirectory for Database {
    async fn find_by_login(&self, login: &str) -> StoreResult<Option<UserRecord>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, roles FROM users WHERE login = ?")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, roles)| UserRecord {
            id,
            roles: roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        }))
    }
}
