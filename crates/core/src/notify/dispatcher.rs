//! Notification dispatcher
//!
//! Notifications go out only after the state change committed. Delivery
//! failures are retried and then logged; they never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use servicedesk_domain::NotificationConfig;
use tracing::{debug, warn};

use super::ports::{Notification, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Spawn a task per batch and return immediately.
    Background,
    /// Await delivery before returning; errors are still swallowed.
    Inline,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    mode: DeliveryMode,
    max_attempts: u32,
    backoff: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, mode: DeliveryMode) -> Self {
        Self { notifier, mode, max_attempts: 3, backoff: Duration::from_millis(500) }
    }

    pub fn from_config(notifier: Arc<dyn Notifier>, config: &NotificationConfig) -> Self {
        let mode = if config.background { DeliveryMode::Background } else { DeliveryMode::Inline };
        Self::new(notifier, mode)
            .with_retry(config.max_attempts, Duration::from_millis(config.retry_backoff_ms))
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub async fn dispatch(&self, notifications: Vec<Notification>) {
        let notifications: Vec<Notification> =
            notifications.into_iter().filter(|n| !n.recipients.is_empty()).collect();
        if notifications.is_empty() {
            return;
        }

        match self.mode {
            DeliveryMode::Inline => self.deliver_all(notifications).await,
            DeliveryMode::Background => {
                let this = self.clone();
                tokio::spawn(async move { this.deliver_all(notifications).await });
            }
        }
    }

    async fn deliver_all(&self, notifications: Vec<Notification>) {
        for notification in &notifications {
            self.deliver(notification).await;
        }
    }

    async fn deliver(&self, notification: &Notification) {
        for attempt in 1..=self.max_attempts {
            match self.notifier.send(notification).await {
                Ok(()) => {
                    debug!(
                        request_id = %notification.related_request_id,
                        recipients = notification.recipients.len(),
                        attempt,
                        "notification delivered"
                    );
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    debug!(error = %e, attempt, "notification attempt failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    warn!(
                        request_id = %notification.related_request_id,
                        subject = %notification.subject,
                        attempts = self.max_attempts,
                        error = %e,
                        "notification dropped after retries"
                    );
                }
            }
        }
    }
}
