//! Notification service port (driven/secondary port)
//!
//! This module defines the interface for surfacing sync results, failures
//! and progress to the user. The CLI prints them; other front ends may show
//! toasts or status-bar messages.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because notification delivery is adapter-specific.
//! - Notifications are fire-and-forget; engines log and ignore delivery errors.
//! - Progress messages use the `"Syncing (N%)"` text produced by the engines.

use serde::{Deserialize, Serialize};

/// Priority level for a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    /// Requires user action (for example re-entering a credential)
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// A notification to display to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Title of the notification (short, descriptive)
    pub title: String,
    /// Body text with details about the event
    pub body: String,
    pub priority: NotificationPriority,
    /// Category for grouping/filtering ("sync", "error", "auth")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates a sync-related notification
    pub fn sync(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category("sync")
    }

    /// Creates an error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }

    /// Creates a credential notification that needs the user to act
    pub fn auth(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::Critical)
            .with_category("auth")
    }
}

/// Port trait for notifications and progress reporting
///
/// - `notify` sends a one-shot message.
/// - `show_progress` creates or updates the indicator named `progress_id`;
///   `percent` ranges from 0.0 to 100.0.
/// - `clear_progress` removes that indicator once the run ends.
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;

    async fn show_progress(
        &self,
        progress_id: &str,
        title: &str,
        percent: f64,
    ) -> anyhow::Result<()>;

    async fn clear_progress(&self, progress_id: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_category_and_priority() {
        let n = Notification::sync("Pull", "You're up to date!");
        assert_eq!(n.category, "sync");
        assert_eq!(n.priority, NotificationPriority::Normal);

        let n = Notification::error("Push failed", "timeout");
        assert_eq!(n.category, "error");
        assert_eq!(n.priority, NotificationPriority::High);

        let n = Notification::auth("Credential rejected", "re-enter it");
        assert_eq!(n.category, "auth");
        assert_eq!(n.priority, NotificationPriority::Critical);
    }

    #[test]
    fn test_priority_display_and_default() {
        assert_eq!(NotificationPriority::default(), NotificationPriority::Normal);
        assert_eq!(NotificationPriority::Critical.to_string(), "critical");
    }
}
