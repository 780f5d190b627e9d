//! SLA policy commands

use servicedesk_core::SlaPolicyRepository;
use servicedesk_domain::{Result, SlaPolicy, SlaPolicyId};
use servicedesk_infra::require_policy;

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

/// Validate and store a policy. New requests pick it up on creation.
pub async fn save_sla_policy(ctx: &AppContext, policy: SlaPolicy) -> Result<()> {
    execute_command("sla::save_sla_policy", || async { ctx.policies.save(&policy).await }).await
}

pub async fn get_sla_policy(ctx: &AppContext, policy_id: SlaPolicyId) -> Result<SlaPolicy> {
    execute_command("sla::get_sla_policy", || async {
        require_policy(ctx.policies.as_ref(), policy_id).await
    })
    .await
}

pub async fn list_sla_policies(ctx: &AppContext) -> Result<Vec<SlaPolicy>> {
    execute_command("sla::list_sla_policies", || async { ctx.policies.list_active().await }).await
}
