//! User-facing toast notifications.
//!
//! Notifications are fire-and-forget: nothing in checkout waits on or reads
//! back a delivery result.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// How a toast is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Success,
    Destructive,
}

/// A toast shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    #[must_use]
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Success,
        }
    }

    #[must_use]
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Bounded buffer of notifications waiting to be shown.
///
/// Every notification is logged as it arrives. Each checkout session owns
/// one; the client drains it when it polls the session. Oldest entries are
/// dropped once the buffer is full.
#[derive(Debug)]
pub struct NotificationLog {
    pending: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

impl NotificationLog {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Take every pending notification, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// Copy of the pending notifications without removing them.
    pub fn pending(&self) -> Vec<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            NotificationVariant::Success => tracing::info!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
            NotificationVariant::Destructive => tracing::warn!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.len() == self.capacity {
            pending.pop_front();
        }
        pending.push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_drains_in_order() {
        let log = NotificationLog::default();
        log.notify(Notification::destructive("first", ""));
        log.notify(Notification::success("second", ""));

        let titles: Vec<_> = log.drain().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, ["first", "second"]);
        assert!(log.drain().is_empty());
    }

    #[test]
    fn test_log_drops_oldest_when_full() {
        let log = NotificationLog::with_capacity(2);
        for title in ["a", "b", "c"] {
            log.notify(Notification::success(title, ""));
        }
        let titles: Vec<_> = log.pending().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, ["b", "c"]);
    }

    #[test]
    fn test_variant_serialization() {
        let json = serde_json::to_value(Notification::destructive("t", "d")).unwrap_or_default();
        assert_eq!(json["variant"], "destructive");
    }
}
