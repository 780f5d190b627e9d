//! Service request commands

use servicedesk_core::{ActionOutcome, PermissionSet, RequestAction, TimelineEntry};
use servicedesk_domain::{Locale, RequestDraft, RequestId, Result, ServiceRequest, Stage, UserId};

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

/// Open a request on behalf of `actor_id`.
pub async fn create_request(
    ctx: &AppContext,
    actor_id: UserId,
    draft: RequestDraft,
) -> Result<ServiceRequest> {
    execute_command("requests::create_request", || async {
        ctx.lifecycle.create_request(actor_id, draft).await
    })
    .await
}

pub async fn get_request(ctx: &AppContext, request_id: RequestId) -> Result<ServiceRequest> {
    execute_command("requests::get_request", || async { ctx.lifecycle.request(request_id).await })
        .await
}

/// What `actor_id` may do on the request right now.
pub async fn get_permissions(
    ctx: &AppContext,
    request_id: RequestId,
    actor_id: UserId,
) -> Result<PermissionSet> {
    execute_command("requests::get_permissions", || async {
        ctx.lifecycle.permissions(request_id, actor_id).await
    })
    .await
}

pub async fn get_timeline(
    ctx: &AppContext,
    request_id: RequestId,
    locale: Locale,
) -> Result<Vec<TimelineEntry>> {
    execute_command("requests::get_timeline", || async {
        ctx.lifecycle.timeline(request_id, locale).await
    })
    .await
}

/// Run one lifecycle action as a single unit of work.
///
/// `observed_stage` is the stage the caller rendered; a stale value fails
/// with `ConcurrentModification` instead of acting on a moved request.
pub async fn perform_action(
    ctx: &AppContext,
    request_id: RequestId,
    actor_id: UserId,
    action: RequestAction,
    observed_stage: Option<Stage>,
) -> Result<ActionOutcome> {
    execute_command("requests::perform_action", || async {
        ctx.lifecycle.perform(request_id, actor_id, action, observed_stage).await
    })
    .await
}
