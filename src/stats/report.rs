//! Rolling 30-day report

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::{DailyCounterStore, DailyStat, StoreResult};

/// Report window length; also the divisor for the daily averages
pub const REPORT_WINDOW_DAYS: usize = 30;

/// Gap-filled report over the window ending at `today`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginReport {
    /// Oldest first, always `REPORT_WINDOW_DAYS` entries
    pub days: Vec<DailyStat>,
    pub total_logins: u64,
    pub total_unique_logins: u64,
    pub avg_logins: f64,
    pub avg_unique_logins: f64,
}

/// Parallel series for a chart renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub logins: Vec<u64>,
    pub unique_logins: Vec<u64>,
}

impl LoginReport {
    pub fn chart(&self) -> ChartSeries {
        ChartSeries {
            labels: self
                .days
                .iter()
                .map(|d| d.day.format("%Y-%m-%d").to_string())
                .collect(),
            logins: self.days.iter().map(|d| d.logins).collect(),
            unique_logins: self.days.iter().map(|d| d.unique_logins).collect(),
        }
    }
}

/// First day of the window ending at `today`
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(REPORT_WINDOW_DAYS as i64 - 1)
}

pub async fn build_report(
    store: &dyn DailyCounterStore,
    today: NaiveDate,
) -> StoreResult<LoginReport> {
    let start = window_start(today);
    let rows = store.range(start, today).await?;
    Ok(fill_window(today, &rows))
}

/// Lay `rows` onto the window, zero-filling missing days
pub fn fill_window(today: NaiveDate, rows: &[DailyStat]) -> LoginReport {
    let mut rows = rows.iter().peekable();
    let days: Vec<DailyStat> = window_start(today)
        .iter_days()
        .take(REPORT_WINDOW_DAYS)
        .map(|day| {
            // Skip anything out of order or outside the window
            while rows.next_if(|r| r.day < day).is_some() {}
            match rows.next_if(|r| r.day == day) {
                Some(row) => *row,
                None => DailyStat::empty(day),
            }
        })
        .collect();

    let total_logins: u64 = days.iter().map(|d| d.logins).sum();
    let total_unique_logins: u64 = days.iter().map(|d| d.unique_logins).sum();

    LoginReport {
        days,
        total_logins,
        total_unique_logins,
        avg_logins: total_logins as f64 / REPORT_WINDOW_DAYS as f64,
        avg_unique_logins: total_unique_logins as f64 / REPORT_WINDOW_DAYS as f64,
    }
}
