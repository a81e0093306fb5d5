use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

pub const NOTIFICATION_LIFETIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Error,
}

impl NotificationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub raised_at: Instant,
}

impl Notification {
    pub fn error(message: impl Into<String>, raised_at: Instant) -> Self {
        Self {
            message: message.into(),
            level: NotificationLevel::Error,
            raised_at,
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.raised_at + NOTIFICATION_LIFETIME
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Auto-dismissing banners, newest last.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    items: VecDeque<Notification>,
}

impl NotificationQueue {
    /// Queues a banner, first dropping any that expired before it was raised.
    pub fn push(&mut self, notification: Notification) {
        self.prune(notification.raised_at);
        self.items.push_back(notification);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops expired banners and returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.is_expired(now));
        before - self.items.len()
    }

    pub fn active(&mut self, now: Instant) -> Vec<Notification> {
        self.prune(now);
        self.items.iter().cloned().collect()
    }
}
