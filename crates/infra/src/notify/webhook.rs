//! Notifier that POSTs each notification as JSON to a webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use servicedesk_core::{Notification, Notifier};
use servicedesk_domain::{Result, ServiceDeskError};
use tracing::debug;

use crate::errors::conversions::to_domain;

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns `ServiceDeskError::Config` for an empty endpoint or a client
    /// that cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(ServiceDeskError::Config("webhook URL is empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("servicedesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceDeskError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(to_domain)?;
        let status = response.status();
        response.error_for_status().map_err(to_domain)?;

        debug!(
            request_id = %notification.related_request_id,
            %status,
            "notification delivered to webhook"
        );
        Ok(())
    }
}
