//! Customer login aggregation
//!
//! Login events are folded into per-day counters (total logins and unique
//! customers). The stores behind this module are injected as trait objects so
//! the SQLite implementation can be swapped for in-memory fakes in tests.

pub mod ingest;
pub mod report;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ingest::{LoginStats, MetricsSnapshot};
pub use report::LoginReport;

/// Errors raised by the durable stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("increment of {0} does not fit a counter")]
    AmountOutOfRange(u64),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One day bucket. `unique_logins` never exceeds `logins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyStat {
    pub day: NaiveDate,
    pub logins: u64,
    pub unique_logins: u64,
}

impl DailyStat {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            logins: 0,
            unique_logins: 0,
        }
    }
}

/// Which counter of a day bucket to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Login,
    Unique,
}

/// A user as resolved from the host's directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserRecord {
    #[cfg(test)]
    pub fn new(id: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            id: id.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Durable day -> (logins, unique_logins) mapping
#[async_trait]
pub trait DailyCounterStore: Send + Sync {
    /// Atomically add `amount` to one counter of `day`, creating the row with
    /// zeroed counters first if it does not exist.
    async fn increment(&self, day: NaiveDate, counter: Counter, amount: u64) -> StoreResult<()>;

    /// Stored rows with `start <= day <= end`, ascending by day. Days without
    /// a row are absent.
    async fn range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyStat>>;
}

/// Durable user -> last counted day mapping
#[async_trait]
pub trait LoginDedupTracker: Send + Sync {
    /// Record `today` as the user's last counted day. Returns true only for the
    /// single call that moved the marker to `today`; concurrent calls for the
    /// same user and day see exactly one `true`.
    async fn mark_and_check(&self, user_id: &str, today: NaiveDate) -> StoreResult<bool>;
}

/// Lookup of users by login identifier
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_login(&self, login: &str) -> StoreResult<Option<UserRecord>>;
}
