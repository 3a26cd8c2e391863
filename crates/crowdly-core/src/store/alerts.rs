//! Bounded in-memory alert queue.
//!
//! One queue backs both the alerts panel and the banner: newest first,
//! oldest evicted once capacity is reached. Alerts live only as long as
//! the session -- nothing is persisted.

use std::collections::VecDeque;
use std::sync::Arc;

use crowdly_api::AlertEvent;

/// Maximum number of alerts retained.
pub const ALERT_QUEUE_CAPACITY: usize = 50;

#[derive(Debug, Default)]
pub struct AlertQueue {
    items: VecDeque<Arc<AlertEvent>>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::with_capacity(ALERT_QUEUE_CAPACITY),
        }
    }

    /// Insert a new alert at the front, evicting the oldest when full.
    pub fn push(&mut self, alert: Arc<AlertEvent>) {
        if self.items.len() == ALERT_QUEUE_CAPACITY {
            self.items.pop_back();
        }
        self.items.push_front(alert);
    }

    /// Newest-first snapshot for the views.
    pub fn snapshot(&self) -> Vec<Arc<AlertEvent>> {
        self.items.iter().cloned().collect()
    }

    /// The most recent alert, if any.
    pub fn newest(&self) -> Option<&Arc<AlertEvent>> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
