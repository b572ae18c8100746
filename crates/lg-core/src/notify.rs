//! User-facing notifications (toasts)

use parking_lot::Mutex;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A fire-and-forget message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// Notification surface the grid reports to
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                error!(title = %notification.title, "{}", notification.description)
            }
            _ => info!(title = %notification.title, "{}", notification.description),
        }
    }
}

/// Keeps every notification for later inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries.lock().last().cloned()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .iter()
            .filter(|n| n.is_error())
            .cloned()
            .collect()
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.entries.lock().push(notification);
    }
}
