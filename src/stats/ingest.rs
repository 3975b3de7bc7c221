//! Login event ingestion
//!
//! Counting is best-effort: nothing here returns an error to the login path.
//! Discarded events and store failures are logged and tallied in
//! [`IngestMetrics`] instead.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::report::{self, LoginReport};
use super::{Counter, DailyCounterStore, LoginDedupTracker, StoreResult, UserDirectory, UserRecord};
use crate::clock::DayClock;
use crate::events::{CountedLogin, EventBus};

/// Ingestion outcome counters
#[derive(Debug, Default)]
pub struct IngestMetrics {
    counted: AtomicU64,
    unique: AtomicU64,
    unresolved: AtomicU64,
    not_customer: AtomicU64,
    store_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counted: u64,
    pub unique: u64,
    pub unresolved: u64,
    pub not_customer: u64,
    pub store_failures: u64,
}

impl IngestMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counted: self.counted.load(Ordering::Relaxed),
            unique: self.unique.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            not_customer: self.not_customer.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Login statistics service: ingestion and reporting over injected stores
#[derive(Clone)]
pub struct LoginStats {
    counters: Arc<dyn DailyCounterStore>,
    markers: Arc<dyn LoginDedupTracker>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn DayClock>,
    customer_role: Arc<str>,
    metrics: Arc<IngestMetrics>,
    event_bus: Option<EventBus>,
}

impl LoginStats {
    pub fn new(
        counters: Arc<dyn DailyCounterStore>,
        markers: Arc<dyn LoginDedupTracker>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn DayClock>,
        customer_role: &str,
    ) -> Self {
        Self {
            counters,
            markers,
            users,
            clock,
            customer_role: Arc::from(customer_role),
            metrics: Arc::new(IngestMetrics::default()),
            event_bus: None,
        }
    }

    /// Broadcast every counted login on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Count a login. `user` may be supplied when the caller already resolved
    /// it; otherwise the login identifier is looked up in the user directory.
    /// Unknown users and non-customers are dropped without side effects.
    pub async fn handle_login(&self, login: &str, user: Option<UserRecord>) {
        let user = match user {
            Some(user) => user,
            None => match self.users.find_by_login(login).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    debug!("Ignoring login for unknown user '{}'", login);
                    IngestMetrics::bump(&self.metrics.unresolved);
                    return;
                }
                Err(e) => {
                    warn!("Failed to resolve user '{}': {}", login, e);
                    IngestMetrics::bump(&self.metrics.store_failures);
                    return;
                }
            },
        };

        if !user.has_role(&self.customer_role) {
            debug!("Ignoring login for non-customer '{}'", user.id);
            IngestMetrics::bump(&self.metrics.not_customer);
            return;
        }

        if let Err(e) = self.count(&user).await {
            warn!("Failed to count login for user '{}': {}", user.id, e);
            IngestMetrics::bump(&self.metrics.store_failures);
        }
    }

    async fn count(&self, user: &UserRecord) -> StoreResult<()> {
        let today = self.clock.today();

        // Login first so unique_logins never runs ahead of logins
        self.counters.increment(today, Counter::Login, 1).await?;
        IngestMetrics::bump(&self.metrics.counted);

        let unique = self.markers.mark_and_check(&user.id, today).await?;
        if unique {
            self.counters.increment(today, Counter::Unique, 1).await?;
            IngestMetrics::bump(&self.metrics.unique);
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(CountedLogin {
                day: today,
                user_id: user.id.clone(),
                unique,
            });
        }
        Ok(())
    }

    /// 30-day report ending at `today`
    pub async fn report_for(&self, today: NaiveDate) -> StoreResult<LoginReport> {
        report::build_report(self.counters.as_ref(), today).await
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
