use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Notification, NotificationSink, NotifyError};

/// Bounded per-owner notification history. Evicts the oldest entry when an
/// owner's buffer is full.
#[derive(Debug)]
pub struct NotificationLog {
    per_owner: DashMap<String, VecDeque<Notification>>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            per_owner: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, notification: Notification) {
        let mut buffer = self
            .per_owner
            .entry(notification.owner_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(notification);
    }

    /// Newest first, paginated. Returns the page and the owner's total.
    pub fn list(&self, owner_id: &str, limit: usize, skip: usize) -> (Vec<Notification>, usize) {
        match self.per_owner.get(owner_id) {
            Some(buffer) => {
                let page = buffer.iter().rev().skip(skip).take(limit).cloned().collect();
                (page, buffer.len())
            }
            None => (Vec::new(), 0),
        }
    }

    pub fn unread_count(&self, owner_id: &str) -> usize {
        self.per_owner
            .get(owner_id)
            .map(|b| b.iter().filter(|n| !n.read).count())
            .unwrap_or(0)
    }

    pub fn mark_read(&self, owner_id: &str, notification_id: &str) -> bool {
        let Some(mut buffer) = self.per_owner.get_mut(owner_id) else {
            return false;
        };
        match buffer.iter_mut().find(|n| n.id == notification_id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    /// Returns how many notifications changed from unread to read.
    pub fn mark_all_read(&self, owner_id: &str) -> usize {
        let Some(mut buffer) = self.per_owner.get_mut(owner_id) else {
            return 0;
        };
        let mut changed = 0;
        for n in buffer.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        changed
    }

    pub fn clear(&self, owner_id: &str) {
        self.per_owner.remove(owner_id);
    }
}

#[async_trait]
impl NotificationSink for NotificationLog {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.push(notification);
        Ok(())
    }
}
