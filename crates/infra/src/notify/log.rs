//! Notifier that only writes a structured log line.

use async_trait::async_trait;
use servicedesk_core::{Notification, Notifier};
use servicedesk_domain::Result;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            request_id = %notification.related_request_id,
            recipients = ?notification.recipients,
            subject = %notification.subject,
            "notification"
        );
        Ok(())
    }
}
