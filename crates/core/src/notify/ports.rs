//! Port interface for the notifier collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use servicedesk_domain::{RequestId, Result, UserId};

/// Message payload handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipients: Vec<UserId>,
    pub subject: String,
    pub body: String,
    pub related_request_id: RequestId,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}
