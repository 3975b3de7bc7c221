//! Event bus for broadcasting counted logins

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A login that made it into the day counters
#[derive(Debug, Clone, Serialize)]
pub struct CountedLogin {
    pub day: NaiveDate,
    pub user_id: String,
    /// First counted login of this user on `day`
    pub unique: bool,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<CountedLogin>>,
}

impl EventBus {
    pub fn new(sender: broadcast::Sender<Arc<CountedLogin>>) -> Self {
        Self { sender }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self::new(sender)
    }

    pub fn publish(&self, event: CountedLogin) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CountedLogin>> {
        self.sender.subscribe()
    }
}
