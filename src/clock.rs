//! Calendar day source

use chrono::{FixedOffset, NaiveDate, Utc};

/// Supplies the current calendar day in the deployment timezone
pub trait DayClock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock shifted by a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemDayClock {
    offset: FixedOffset,
}

impl SystemDayClock {
    /// Returns `None` when the offset is a day or more away from UTC
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        Some(Self { offset })
    }
}

impl DayClock for SystemDayClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to a settable day, for tests
#[cfg(test)]
pub struct FixedDayClock {
    day: std::sync::Mutex<NaiveDate>,
}

#[cfg(test)]
impl FixedDayClock {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: std::sync::Mutex::new(day),
        }
    }

    pub fn set(&self, day: NaiveDate) {
        *self.day.lock().unwrap() = day;
    }
}

#[cfg(test)]
impl DayClock for FixedDayClock {
    fn today(&self) -> NaiveDate {
        *self.day.lock().unwrap()
    }
}
