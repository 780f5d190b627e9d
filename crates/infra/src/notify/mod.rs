//! Notifier adapters
//!
//! Delivery retries live in the core `NotificationDispatcher`; adapters make
//! exactly one attempt per call.

pub mod log;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use servicedesk_core::Notifier;
use servicedesk_domain::{NotificationConfig, Result};

pub use self::log::LogNotifier;
pub use webhook::WebhookNotifier;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook delivery when a URL is configured, log-only otherwise.
pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    match config.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url, WEBHOOK_TIMEOUT)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
