//! Port interfaces for SLA policies

use async_trait::async_trait;
use servicedesk_domain::{Result, SlaPolicy, SlaPolicyId};

#[async_trait]
pub trait SlaPolicyRepository: Send + Sync {
    async fn get(&self, id: SlaPolicyId) -> Result<Option<SlaPolicy>>;

    /// Active policies in resolution order.
    async fn list_active(&self) -> Result<Vec<SlaPolicy>>;

    /// Validates and stores a policy with its lines and escalation rules.
    async fn save(&self, policy: &SlaPolicy) -> Result<()>;
}
