//! Escalation commands

use servicedesk_core::SweepReport;
use servicedesk_domain::Result;

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

/// Run one escalation sweep now, outside the cron schedule.
pub async fn run_escalation_sweep(ctx: &AppContext) -> Result<SweepReport> {
    execute_command("escalation::run_escalation_sweep", || async { ctx.sweeper.sweep_now().await })
        .await
}
