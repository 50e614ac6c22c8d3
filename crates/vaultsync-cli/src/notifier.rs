//! Terminal notification sink
//!
//! Prints engine notifications through the active output formatter. Progress
//! is drawn on one stderr line in human mode and emitted as JSON lines in
//! JSON mode.

use std::io::Write;

use anyhow::Result;

use vaultsync_core::ports::{INotificationService, Notification, NotificationPriority};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

pub struct TerminalNotifier {
    format: OutputFormat,
    formatter: Box<dyn OutputFormatter>,
    quiet: bool,
}

impl TerminalNotifier {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self {
            format,
            formatter: get_formatter(format.is_json()),
            quiet,
        }
    }
}

#[async_trait::async_trait]
impl INotificationService for TerminalNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if self.format.is_json() {
            self.formatter
                .print_json(&serde_json::to_value(notification)?);
            return Ok(());
        }

        let message = format!("{}: {}", notification.title, notification.body);
        match notification.priority {
            NotificationPriority::Critical | NotificationPriority::High => {
                self.formatter.error(&message)
            }
            NotificationPriority::Normal | NotificationPriority::Low if !self.quiet => {
                self.formatter.success(&message)
            }
            _ => {}
        }
        Ok(())
    }

    async fn show_progress(&self, progress_id: &str, title: &str, percent: f64) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        if self.format.is_json() {
            eprintln!(
                "{}",
                serde_json::json!({"progress": progress_id, "title": title, "percent": percent})
            );
            return Ok(());
        }

        let mut stderr = std::io::stderr().lock();
        write!(stderr, "\r\x1b[2K{title}")?;
        stderr.flush()?;
        Ok(())
    }

    async fn clear_progress(&self, _progress_id: &str) -> Result<()> {
        if self.quiet || self.format.is_json() {
            return Ok(());
        }
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "\r\x1b[2K")?;
        stderr.flush()?;
        Ok(())
    }
}
