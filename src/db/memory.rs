//! In-memory stores for tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::stats::{
    Counter, DailyCounterStore, DailyStat, LoginDedupTracker, StoreError, StoreResult,
    UserDirectory, UserRecord,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    days: Arc<Mutex<BTreeMap<NaiveDate, DailyStat>>>,
    markers: Arc<Mutex<HashMap<String, NaiveDate>>>,
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, login: &str, user: UserRecord) {
        self.users.write().await.insert(login.to_string(), user);
    }

    /// Make every subsequent store call fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn day(&self, day: NaiveDate) -> Option<DailyStat> {
        self.days.lock().await.get(&day).copied()
    }

    pub async fn marker(&self, user_id: &str) -> Option<NaiveDate> {
        self.markers.lock().await.get(user_id).copied()
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DailyCounterStore for MemoryStore {
    async fn increment(&self, day: NaiveDate, counter: Counter, amount: u64) -> StoreResult<()> {
        self.check()?;
        let mut days = self.days.lock().await;
        let row = days.entry(day).or_insert_with(|| DailyStat::empty(day));
        match counter {
            Counter::Login => row.logins += amount,
            Counter::Unique => row.unique_logins += amount,
        }
        Ok(())
    }

    async fn range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyStat>> {
        self.check()?;
        if start > end {
            return Ok(Vec::new());
        }
        let days = self.days.lock().await;
        Ok(days.range(start..=end).map(|(_, stat)| *stat).collect())
    }
}

#[async_trait]
impl LoginDedupTracker for MemoryStore {
    async fn mark_and_check(&self, user_id: &str, today: NaiveDate) -> StoreResult<bool> {
        self.check()?;
        let mut markers = self.markers.lock().await;
        match markers.insert(user_id.to_string(), today) {
            Some(previous) => Ok(previous != today),
            None => Ok(true),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_login(&self, login: &str) -> StoreResult<Option<UserRecord>> {
        self.check()?;
        Ok(self.users.read().await.get(login).cloned())
    }
}
