//! Stage transition engine
//!
//! Applies one action to a working copy of a request. Every precondition is
//! checked before the first mutation, and the working copy is only persisted
//! by the caller once the whole action succeeded, so a failed action leaves
//! stored state untouched.

use chrono::{DateTime, Utc};
use servicedesk_domain::constants::{READY_FOR_APPROVAL_NOTE, REQUEST_NUMBER_PREFIX};
use servicedesk_domain::{
    Actor, ApprovalStatus, DetailsPatch, EscalationRule, HistoryDraft, HistoryEventType,
    ReplacementDraft, RequestDraft, RequestId, ResolutionPatch, Result, ServiceDeskError,
    ServiceRequest, SlaPolicy, Stage, Team, TeamId, UserId, WorkOrder, WorkOrderDraft,
    WorkOrderId, WorkStatus,
};
use uuid::Uuid;

use super::catalog::StageCatalog;
use crate::access::{Permission, PermissionEvaluator};
use crate::sla::SlaCalculator;

/// Explicit actions a collaborator can invoke on an existing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestAction {
    AssignTeam { team_id: TeamId },
    AssignTechnician { technician_id: UserId },
    CreateWorkOrder { draft: WorkOrderDraft },
    StartWork { work_order_id: WorkOrderId },
    PauseWork { work_order_id: WorkOrderId },
    ResumeWork { work_order_id: WorkOrderId },
    CompleteWork { work_order_id: WorkOrderId },
    PutOnHold { reason: String, expected_resume_at: Option<DateTime<Utc>> },
    ResumeFromHold,
    SendForApproval,
    Approve,
    Reject { reason: String, replacement: Option<ReplacementDraft> },
    /// Owner-direct or approval-routed, decided by ownership and stage.
    Cancel { reason: String },
    Escalate,
    UpdateDetails(DetailsPatch),
    UpdateResolution(ResolutionPatch),
    AddComment { text: String },
}

impl RequestAction {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AssignTeam { .. } => "assign_team",
            Self::AssignTechnician { .. } => "assign_technician",
            Self::CreateWorkOrder { .. } => "create_work_order",
            Self::StartWork { .. } => "start_work",
            Self::PauseWork { .. } => "pause_work",
            Self::ResumeWork { .. } => "resume_work",
            Self::CompleteWork { .. } => "complete_work",
            Self::PutOnHold { .. } => "put_on_hold",
            Self::ResumeFromHold => "resume_from_hold",
            Self::SendForApproval => "send_for_approval",
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Cancel { .. } => "cancel",
            Self::Escalate => "escalate",
            Self::UpdateDetails(_) => "update_details",
            Self::UpdateResolution(_) => "update_resolution",
            Self::AddComment { .. } => "add_comment",
        }
    }
}

/// Who should receive a notification once the unit of work commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Users(Vec<UserId>),
    /// Department manager of the effective team, else every CTO.
    Approvers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub audience: Audience,
    pub subject: String,
    pub body: String,
}

/// Working copy of a request plus everything the action wants to write.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub request: ServiceRequest,
    pub history: Vec<HistoryDraft>,
    pub notifications: Vec<PendingNotification>,
    pub spawned: Option<ServiceRequest>,
    pub created_work_order: Option<WorkOrderId>,
    /// Member whose round-robin stamp is updated after commit.
    pub assignment_to_record: Option<(TeamId, UserId)>,
    /// Set when something other than history changed.
    pub touched: bool,
}

impl UnitOfWork {
    pub fn new(request: ServiceRequest) -> Self {
        Self {
            request,
            history: Vec::new(),
            notifications: Vec::new(),
            spawned: None,
            created_work_order: None,
            assignment_to_record: None,
            touched: false,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.touched || !self.history.is_empty() || self.spawned.is_some()
    }

    fn notify(&mut self, audience: Audience, subject: String, body: String) {
        self.notifications.push(PendingNotification { audience, subject, body });
    }
}

/// Per-call facts the engine evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub actor: &'a Actor,
    pub effective_team: Option<TeamId>,
    pub policy: Option<&'a SlaPolicy>,
    pub now: DateTime<Utc>,
}

/// Lookups the service performs before the engine runs.
#[derive(Debug, Clone, Default)]
pub struct Prefetched {
    /// Target of `AssignTeam`.
    pub team: Option<Team>,
    /// Technician picked for an auto-assigning team.
    pub auto_assignee: Option<UserId>,
    /// Recipient of a manual escalation.
    pub escalation_contact: Option<UserId>,
    /// Policy named by an `UpdateDetails` patch.
    pub new_policy: Option<SlaPolicy>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageTransitionEngine {
    catalog: StageCatalog,
    permissions: PermissionEvaluator,
    sla: SlaCalculator,
}

impl StageTransitionEngine {
    pub fn new(sla: SlaCalculator) -> Self {
        Self { catalog: StageCatalog::new(), permissions: PermissionEvaluator::new(), sla }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn permissions(&self) -> &PermissionEvaluator {
        &self.permissions
    }

    pub fn sla(&self) -> &SlaCalculator {
        &self.sla
    }

    /// Run `action` against the working copy and refresh the SLA fields.
    ///
    /// # Errors
    /// `PermissionDenied`, `InvalidTransition`, `InvalidInput` or `NotFound`;
    /// on error the working copy must be discarded.
    pub fn apply(
        &self,
        uow: &mut UnitOfWork,
        action: RequestAction,
        ctx: &ActionContext<'_>,
        facts: &Prefetched,
    ) -> Result<()> {
        match action {
            RequestAction::AssignTeam { team_id } => self.assign_team(uow, team_id, ctx, facts)?,
            RequestAction::AssignTechnician { technician_id } => {
                self.assign_technician(uow, technician_id, ctx)?;
            }
            RequestAction::CreateWorkOrder { draft } => self.create_work_order(uow, draft, ctx)?,
            RequestAction::StartWork { work_order_id } => self.start_work(uow, work_order_id, ctx)?,
            RequestAction::PauseWork { work_order_id } => self.pause_work(uow, work_order_id, ctx)?,
            RequestAction::ResumeWork { work_order_id } => {
                self.resume_work(uow, work_order_id, ctx)?;
            }
            RequestAction::CompleteWork { work_order_id } => {
                self.complete_work(uow, work_order_id, ctx)?;
            }
            RequestAction::PutOnHold { reason, expected_resume_at } => {
                self.put_on_hold(uow, &reason, expected_resume_at, ctx)?;
            }
            RequestAction::ResumeFromHold => self.resume_from_hold(uow, ctx)?,
            RequestAction::SendForApproval => self.send_for_approval(uow, ctx)?,
            RequestAction::Approve => self.approve(uow, ctx)?,
            RequestAction::Reject { reason, replacement } => {
                self.reject(uow, &reason, replacement, ctx)?;
            }
            RequestAction::Cancel { reason } => self.cancel(uow, &reason, ctx)?,
            RequestAction::Escalate => self.escalate(uow, ctx, facts)?,
            RequestAction::UpdateDetails(patch) => self.update_details(uow, patch, ctx, facts)?,
            RequestAction::UpdateResolution(patch) => self.update_resolution(uow, patch, ctx)?,
            RequestAction::AddComment { text } => self.add_comment(uow, &text, ctx)?,
        }

        let policy = facts.new_policy.as_ref().or(ctx.policy);
        self.sla.recompute(&mut uow.request, policy, ctx.now);
        Ok(())
    }

    // ========================================================================
    // Transition primitive
    // ========================================================================

    /// Move the request to `target`, recording a `StageChange` entry.
    ///
    /// # Errors
    /// `PermissionDenied` if the actor may not reach `target`,
    /// `InvalidTransition` if `target` is not reachable from the current stage.
    pub fn request_transition(
        &self,
        uow: &mut UnitOfWork,
        target: Stage,
        ctx: &ActionContext<'_>,
        reason: Option<&str>,
        is_automatic: bool,
    ) -> Result<()> {
        self.ensure_transition(&uow.request, target, ctx, is_automatic)?;
        let draft = HistoryDraft::new(uow.request.id, HistoryEventType::StageChange)
            .note(reason.unwrap_or_default())
            .automatic(is_automatic);
        self.move_stage(uow, target, ctx, draft);
        Ok(())
    }

    fn ensure_transition(
        &self,
        request: &ServiceRequest,
        target: Stage,
        ctx: &ActionContext<'_>,
        is_automatic: bool,
    ) -> Result<()> {
        if !self.permissions.can_transition(
            ctx.actor,
            request,
            ctx.effective_team,
            target,
            is_automatic,
        ) {
            return Err(ServiceDeskError::PermissionDenied(format!(
                "user {} may not move request {} from {} to {}",
                ctx.actor.user_id, request.number, request.stage, target
            )));
        }
        if !self.catalog.is_reachable(request.stage, target) {
            return Err(ServiceDeskError::InvalidTransition(format!(
                "request {} cannot move from {} to {}",
                request.number, request.stage, target
            )));
        }
        Ok(())
    }

    /// Apply a validated stage move and record it with `draft`.
    fn move_stage(
        &self,
        uow: &mut UnitOfWork,
        target: Stage,
        ctx: &ActionContext<'_>,
        draft: HistoryDraft,
    ) {
        let request = &mut uow.request;
        let old = request.stage;
        request.stage = target;
        if target == Stage::TeamAssigned && request.assigned_at.is_none() {
            request.assigned_at = Some(ctx.now);
        }
        if target.is_done() {
            request.closed_at = Some(ctx.now);
        }
        self.sla.recompute(request, ctx.policy, ctx.now);

        uow.touched = true;
        uow.history.push(draft.stages(old, target).actor(Some(ctx.actor.user_id)));
    }

    fn check(&self, uow: &UnitOfWork, ctx: &ActionContext<'_>, permission: Permission) -> Result<()> {
        self.permissions.check(ctx.actor, &uow.request, ctx.effective_team, permission)
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn assign_team(
        &self,
        uow: &mut UnitOfWork,
        team_id: TeamId,
        ctx: &ActionContext<'_>,
        facts: &Prefetched,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::AssignTeam)?;
        let team = facts
            .team
            .as_ref()
            .filter(|team| team.id == team_id)
            .ok_or_else(|| ServiceDeskError::NotFound(format!("team {team_id}")))?;
        if !team.active {
            return Err(ServiceDeskError::InvalidInput(format!("team {} is inactive", team.name)));
        }
        if uow.request.assigned_team_id == Some(team_id) {
            return Err(ServiceDeskError::InvalidInput(format!(
                "request {} is already assigned to team {}",
                uow.request.number, team.name
            )));
        }
        let advance = uow.request.stage == Stage::New;
        if advance {
            self.ensure_transition(&uow.request, Stage::TeamAssigned, ctx, true)?;
        }

        let request_id = uow.request.id;
        let old_team = uow.request.assigned_team_id.replace(team_id);
        uow.touched = true;
        uow.history.push(
            HistoryDraft::new(request_id, HistoryEventType::Assignment)
                .teams(old_team, Some(team_id))
                .actor(Some(ctx.actor.user_id))
                .note(format!("Assigned to team {}", team.name)),
        );

        if advance {
            let draft =
                HistoryDraft::new(request_id, HistoryEventType::StageChange).automatic(true);
            self.move_stage(uow, Stage::TeamAssigned, ctx, draft);
        }

        if team.auto_assign && uow.request.technician_id.is_none() {
            if let Some(technician) = facts.auto_assignee {
                self.set_technician(uow, technician, ctx, true);
                uow.assignment_to_record = Some((team_id, technician));
            }
        }
        Ok(())
    }

    fn assign_technician(
        &self,
        uow: &mut UnitOfWork,
        technician_id: UserId,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::AssignTechnician)?;
        if uow.request.technician_id == Some(technician_id) {
            return Err(ServiceDeskError::InvalidInput(format!(
                "technician {technician_id} is already assigned to request {}",
                uow.request.number
            )));
        }
        self.set_technician(uow, technician_id, ctx, false);
        if let Some(team_id) = ctx.effective_team {
            uow.assignment_to_record = Some((team_id, technician_id));
        }
        Ok(())
    }

    fn set_technician(
        &self,
        uow: &mut UnitOfWork,
        technician_id: UserId,
        ctx: &ActionContext<'_>,
        is_automatic: bool,
    ) {
        let old = uow.request.technician_id.replace(technician_id);
        uow.request.technician_assigned_at = Some(ctx.now);
        uow.touched = true;
        uow.history.push(
            HistoryDraft::new(uow.request.id, HistoryEventType::Assignment)
                .technicians(old, Some(technician_id))
                .actor(Some(ctx.actor.user_id))
                .automatic(is_automatic),
        );
    }

    // ========================================================================
    // Work orders
    // ========================================================================

    fn create_work_order(
        &self,
        uow: &mut UnitOfWork,
        draft: WorkOrderDraft,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::CreateWorkOrder)?;
        if draft.name.trim().is_empty() {
            return Err(ServiceDeskError::InvalidInput("work order name is required".into()));
        }
        let advance = matches!(uow.request.stage, Stage::New | Stage::TeamAssigned);
        if advance {
            self.ensure_transition(&uow.request, Stage::WorkOrderCreated, ctx, true)?;
        }

        let request_id = uow.request.id;
        let work_order = WorkOrder::new(Uuid::now_v7(), request_id, draft, ctx.now);
        let work_order_id = work_order.id;
        uow.history.push(
            HistoryDraft::new(request_id, HistoryEventType::WorkOrder)
                .work_order(work_order_id, WorkStatus::Pending)
                .actor(Some(ctx.actor.user_id))
                .note(format!("Created work order {}", work_order.name)),
        );
        uow.request.work_orders.push(work_order);
        uow.created_work_order = Some(work_order_id);
        uow.touched = true;

        if advance {
            let draft =
                HistoryDraft::new(request_id, HistoryEventType::StageChange).automatic(true);
            self.move_stage(uow, Stage::WorkOrderCreated, ctx, draft);
        }
        Ok(())
    }

    fn work_order_status(uow: &UnitOfWork, work_order_id: WorkOrderId) -> Result<WorkStatus> {
        uow.request
            .work_order(work_order_id)
            .map(|wo| wo.status)
            .ok_or_else(|| ServiceDeskError::NotFound(format!("work order {work_order_id}")))
    }

    fn invalid_work_transition(
        work_order_id: WorkOrderId,
        from: WorkStatus,
        action: &str,
    ) -> ServiceDeskError {
        ServiceDeskError::InvalidTransition(format!(
            "cannot {action} work order {work_order_id} while it is {from}"
        ))
    }

    /// Update one work order and record the change.
    fn update_work_order(
        uow: &mut UnitOfWork,
        work_order_id: WorkOrderId,
        ctx: &ActionContext<'_>,
        update: impl FnOnce(&mut WorkOrder),
    ) {
        let request_id = uow.request.id;
        if let Some(work_order) = uow.request.work_order_mut(work_order_id) {
            update(work_order);
            let status = work_order.status;
            let name = work_order.name.clone();
            uow.history.push(
                HistoryDraft::new(request_id, HistoryEventType::WorkOrder)
                    .work_order(work_order_id, status)
                    .actor(Some(ctx.actor.user_id))
                    .note(name),
            );
            uow.touched = true;
        }
    }

    /// Work starting or resuming pulls the request into `InProgress`.
    fn pull_into_progress(&self, uow: &mut UnitOfWork, ctx: &ActionContext<'_>) {
        if uow.request.stage == Stage::InProgress {
            return;
        }
        if uow.request.stage == Stage::OnHold {
            uow.request.clear_hold();
        }
        let draft =
            HistoryDraft::new(uow.request.id, HistoryEventType::StageChange).automatic(true);
        self.move_stage(uow, Stage::InProgress, ctx, draft);
    }

    fn start_work(
        &self,
        uow: &mut UnitOfWork,
        work_order_id: WorkOrderId,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::ManageWork)?;
        let status = Self::work_order_status(uow, work_order_id)?;
        if status != WorkStatus::Pending {
            return Err(Self::invalid_work_transition(work_order_id, status, "start"));
        }
        if uow.request.stage != Stage::InProgress {
            self.ensure_transition(&uow.request, Stage::InProgress, ctx, true)?;
        }

        let now = ctx.now;
        Self::update_work_order(uow, work_order_id, ctx, |wo| {
            wo.status = WorkStatus::InProgress;
            wo.open_log(now);
        });
        self.pull_into_progress(uow, ctx);
        Ok(())
    }

    fn pause_work(
        &self,
        uow: &mut UnitOfWork,
        work_order_id: WorkOrderId,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::ManageWork)?;
        let status = Self::work_order_status(uow, work_order_id)?;
        if status != WorkStatus::InProgress {
            return Err(Self::invalid_work_transition(work_order_id, status, "pause"));
        }
        let now = ctx.now;
        Self::update_work_order(uow, work_order_id, ctx, |wo| {
            wo.status = WorkStatus::Paused;
            wo.close_open_log(now);
        });
        Ok(())
    }

    fn resume_work(
        &self,
        uow: &mut UnitOfWork,
        work_order_id: WorkOrderId,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::ManageWork)?;
        let status = Self::work_order_status(uow, work_order_id)?;
        if status != WorkStatus::Paused {
            return Err(Self::invalid_work_transition(work_order_id, status, "resume"));
        }
        let leaves_hold = uow.request.stage == Stage::OnHold;
        if leaves_hold {
            self.ensure_transition(&uow.request, Stage::InProgress, ctx, true)?;
        }

        let now = ctx.now;
        Self::update_work_order(uow, work_order_id, ctx, |wo| {
            wo.status = WorkStatus::InProgress;
            wo.open_log(now);
        });
        if leaves_hold {
            self.pull_into_progress(uow, ctx);
        }
        Ok(())
    }

    fn complete_work(
        &self,
        uow: &mut UnitOfWork,
        work_order_id: WorkOrderId,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::ManageWork)?;
        let status = Self::work_order_status(uow, work_order_id)?;
        if !matches!(status, WorkStatus::InProgress | WorkStatus::Paused) {
            return Err(Self::invalid_work_transition(work_order_id, status, "complete"));
        }

        let now = ctx.now;
        Self::update_work_order(uow, work_order_id, ctx, |wo| {
            wo.close_open_log(now);
            wo.status = WorkStatus::Completed;
            wo.completed_at = Some(now);
        });

        if uow.request.all_work_orders_completed() {
            uow.history.push(
                HistoryDraft::new(uow.request.id, HistoryEventType::Comment)
                    .note(READY_FOR_APPROVAL_NOTE)
                    .automatic(true),
            );
        }
        Ok(())
    }

    /// Cancel every open work order, closing running time logs.
    fn cancel_open_work_orders(uow: &mut UnitOfWork, now: DateTime<Utc>) -> Vec<String> {
        let mut cancelled = Vec::new();
        for work_order in &mut uow.request.work_orders {
            if work_order.status.is_open() {
                work_order.close_open_log(now);
                work_order.status = WorkStatus::Cancelled;
                cancelled.push(work_order.name.clone());
            }
        }
        if !cancelled.is_empty() {
            uow.touched = true;
        }
        cancelled
    }

    // ========================================================================
    // Hold
    // ========================================================================

    fn put_on_hold(
        &self,
        uow: &mut UnitOfWork,
        reason: &str,
        expected_resume_at: Option<DateTime<Utc>>,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::PutOnHold)?;
        let reason = required_reason(reason, "putting a request on hold")?;
        self.ensure_transition(&uow.request, Stage::OnHold, ctx, false)?;

        let request = &mut uow.request;
        request.resume_stage = Some(request.stage);
        request.hold_reason = Some(reason.to_string());
        request.expected_resume_at = expected_resume_at;

        let note = match expected_resume_at {
            Some(at) => format!("{reason} (expected to resume {})", at.format("%Y-%m-%d %H:%M UTC")),
            None => reason.to_string(),
        };
        let draft = HistoryDraft::new(request.id, HistoryEventType::Hold).note(note);
        self.move_stage(uow, Stage::OnHold, ctx, draft);
        Ok(())
    }

    fn resume_from_hold(&self, uow: &mut UnitOfWork, ctx: &ActionContext<'_>) -> Result<()> {
        self.check(uow, ctx, Permission::ResumeFromHold)?;
        let target = uow.request.resume_stage.ok_or_else(|| {
            ServiceDeskError::InvalidTransition(format!(
                "request {} has no stage to resume to",
                uow.request.number
            ))
        })?;
        self.ensure_transition(&uow.request, target, ctx, false)?;

        uow.request.clear_hold();
        let draft = HistoryDraft::new(uow.request.id, HistoryEventType::StageChange)
            .note("Resumed from hold");
        self.move_stage(uow, target, ctx, draft);
        Ok(())
    }

    // ========================================================================
    // Approval flow
    // ========================================================================

    fn send_for_approval(&self, uow: &mut UnitOfWork, ctx: &ActionContext<'_>) -> Result<()> {
        self.check(uow, ctx, Permission::SendForApproval)?;
        let open: Vec<&str> = uow
            .request
            .work_orders
            .iter()
            .filter(|wo| wo.status != WorkStatus::Completed)
            .map(|wo| wo.name.as_str())
            .collect();
        if !open.is_empty() {
            return Err(ServiceDeskError::InvalidTransition(format!(
                "request {} has work orders that are not completed: {}",
                uow.request.number,
                open.join(", ")
            )));
        }
        self.request_transition(uow, Stage::PendingApproval, ctx, None, false)?;

        let request = &uow.request;
        let (subject, body) = (
            format!("[{}] Approval requested", request.number),
            format!("\"{}\" is completed and waits for your approval.", request.title),
        );
        uow.notify(Audience::Approvers, subject, body);
        Ok(())
    }

    fn approve(&self, uow: &mut UnitOfWork, ctx: &ActionContext<'_>) -> Result<()> {
        self.check(uow, ctx, Permission::Approve)?;

        if uow.request.pending_cancel {
            self.ensure_transition(&uow.request, Stage::Cancelled, ctx, false)?;
            let reason = uow.request.cancel_reason.clone().unwrap_or_default();
            let requested_by = uow.request.cancel_requested_by;
            let cancelled = Self::cancel_open_work_orders(uow, ctx.now);
            uow.request.clear_cancel_request();

            let mut note = reason.clone();
            if !cancelled.is_empty() {
                note.push_str(&format!(" (cancelled work orders: {})", cancelled.join(", ")));
            }
            let draft = HistoryDraft::new(uow.request.id, HistoryEventType::Approval)
                .approval(ApprovalStatus::Cancelled)
                .note(note);
            self.move_stage(uow, Stage::Cancelled, ctx, draft);

            let recipients = recipients([requested_by, uow.request.technician_id], ctx.actor);
            let number = uow.request.number.clone();
            uow.notify(
                Audience::Users(recipients),
                format!("[{number}] Cancellation approved"),
                format!("The request was cancelled. Reason: {reason}"),
            );
        } else {
            self.ensure_transition(&uow.request, Stage::Completed, ctx, false)?;
            let draft = HistoryDraft::new(uow.request.id, HistoryEventType::Approval)
                .approval(ApprovalStatus::Approved);
            self.move_stage(uow, Stage::Completed, ctx, draft);

            let recipients = recipients([Some(uow.request.owner_id)], ctx.actor);
            let number = uow.request.number.clone();
            uow.notify(
                Audience::Users(recipients),
                format!("[{number}] Request completed"),
                format!("\"{}\" was approved and closed.", uow.request.title),
            );
        }
        Ok(())
    }

    fn reject(
        &self,
        uow: &mut UnitOfWork,
        reason: &str,
        replacement: Option<ReplacementDraft>,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::Reject)?;
        let reason = required_reason(reason, "a rejection")?;

        if uow.request.pending_cancel {
            let previous = uow.request.previous_stage.ok_or_else(|| {
                ServiceDeskError::InvalidTransition(format!(
                    "request {} has no previous stage to return to",
                    uow.request.number
                ))
            })?;
            self.ensure_transition(&uow.request, previous, ctx, false)?;
            let requested_by = uow.request.cancel_requested_by;
            uow.request.clear_cancel_request();

            let draft = HistoryDraft::new(uow.request.id, HistoryEventType::Cancellation)
                .approval(ApprovalStatus::Rejected)
                .note(reason);
            self.move_stage(uow, previous, ctx, draft);

            let number = uow.request.number.clone();
            uow.notify(
                Audience::Users(recipients([requested_by], ctx.actor)),
                format!("[{number}] Cancellation rejected"),
                format!("The cancellation request was rejected: {reason}"),
            );
            return Ok(());
        }

        self.ensure_transition(&uow.request, Stage::Rejected, ctx, false)?;
        let spawned = self.replacement_for(&uow.request, replacement, ctx);
        let draft = HistoryDraft::new(uow.request.id, HistoryEventType::Approval)
            .approval(ApprovalStatus::Rejected)
            .note(format!("{reason} (replacement request {})", spawned.number));
        self.move_stage(uow, Stage::Rejected, ctx, draft);

        let number = uow.request.number.clone();
        uow.notify(
            Audience::Users(recipients(
                [Some(uow.request.owner_id), uow.request.technician_id],
                ctx.actor,
            )),
            format!("[{number}] Request rejected"),
            format!("{reason}. Follow-up request {} was opened.", spawned.number),
        );
        uow.spawned = Some(spawned);
        Ok(())
    }

    /// New request carrying over team, categories, location and priority axes.
    fn replacement_for(
        &self,
        original: &ServiceRequest,
        replacement: Option<ReplacementDraft>,
        ctx: &ActionContext<'_>,
    ) -> ServiceRequest {
        let replacement = replacement.unwrap_or_default();
        let draft = RequestDraft {
            title: replacement.title.unwrap_or_else(|| original.title.clone()),
            description: replacement.description.unwrap_or_else(|| original.description.clone()),
            request_type: original.request_type,
            service_category: original.service_category,
            impact: original.impact,
            urgency: original.urgency,
            company_id: original.company_id,
            department_id: original.department_id,
            location: original.location.clone(),
            equipment_category_id: original.equipment_category_id,
            sla_policy_id: original.sla_policy_id,
        };
        let id = Uuid::now_v7();
        let mut spawned =
            ServiceRequest::from_draft(id, request_number(id), original.owner_id, draft, ctx.now);
        spawned.assigned_team_id = original.assigned_team_id;
        spawned.replaces = Some(original.id);
        self.sla.recompute(&mut spawned, ctx.policy, ctx.now);
        spawned
    }

    fn cancel(&self, uow: &mut UnitOfWork, reason: &str, ctx: &ActionContext<'_>) -> Result<()> {
        self.check(uow, ctx, Permission::Cancel)?;
        let reason = required_reason(reason, "a cancellation")?;
        let owner_direct =
            uow.request.is_owner(ctx.actor.user_id) && uow.request.stage == Stage::New;

        if owner_direct {
            self.ensure_transition(&uow.request, Stage::Cancelled, ctx, false)?;
            Self::cancel_open_work_orders(uow, ctx.now);
            let draft = HistoryDraft::new(uow.request.id, HistoryEventType::Approval)
                .approval(ApprovalStatus::Cancelled)
                .note(reason);
            self.move_stage(uow, Stage::Cancelled, ctx, draft);
            return Ok(());
        }

        self.ensure_transition(&uow.request, Stage::PendingApproval, ctx, false)?;
        let request = &mut uow.request;
        request.pending_cancel = true;
        request.cancel_reason = Some(reason.to_string());
        request.cancel_requested_by = Some(ctx.actor.user_id);
        request.previous_stage = Some(request.stage);

        let draft = HistoryDraft::new(request.id, HistoryEventType::Cancellation).note(reason);
        self.move_stage(uow, Stage::PendingApproval, ctx, draft);

        let number = uow.request.number.clone();
        let owner = uow.request.owner_id;
        uow.notify(
            Audience::Users(vec![owner]),
            format!("[{number}] Cancellation requested"),
            format!("Cancellation of \"{}\" needs your decision. Reason: {reason}", uow.request.title),
        );
        Ok(())
    }

    // ========================================================================
    // Escalation
    // ========================================================================

    fn escalate(
        &self,
        uow: &mut UnitOfWork,
        ctx: &ActionContext<'_>,
        facts: &Prefetched,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::Escalate)?;
        let request = &mut uow.request;
        request.escalation_level += 1;
        request.escalated_at = Some(ctx.now);
        if facts.escalation_contact.is_some() {
            request.escalated_to = facts.escalation_contact;
        }
        let level = request.escalation_level;
        let number = request.number.clone();
        let title = request.title.clone();

        uow.touched = true;
        uow.history.push(
            HistoryDraft::new(uow.request.id, HistoryEventType::Escalation)
                .actor(Some(ctx.actor.user_id))
                .note(format!("Manually escalated to level {level}")),
        );
        let contacts = recipients([facts.escalation_contact], ctx.actor);
        if !contacts.is_empty() {
            uow.notify(
                Audience::Users(contacts),
                format!("[{number}] Escalated to level {level}"),
                format!("\"{title}\" was escalated by user {}.", ctx.actor.user_id),
            );
        }
        Ok(())
    }

    /// Apply one SLA escalation rule on behalf of the sweep.
    ///
    /// Returns `false` without touching the request when the level was
    /// already applied or the request is no longer editable.
    pub fn apply_escalation_rule(
        &self,
        uow: &mut UnitOfWork,
        rule: &EscalationRule,
        elapsed_percent: f64,
        now: DateTime<Utc>,
    ) -> bool {
        let request = &mut uow.request;
        if request.stage.is_terminal() || rule.level <= request.escalation_level {
            return false;
        }

        request.escalation_level = rule.level;
        request.escalated_at = Some(now);
        let old_technician = request.technician_id;
        if let Some(fallback) = rule.reassign_to {
            request.technician_id = Some(fallback);
            request.technician_assigned_at = Some(now);
            request.escalated_to = Some(fallback);
        }
        let new_technician = request.technician_id;
        let number = request.number.clone();
        let title = request.title.clone();

        uow.touched = true;
        uow.history.push(
            HistoryDraft::new(request.id, HistoryEventType::Escalation)
                .technicians(old_technician, new_technician)
                .note(format!(
                    "SLA {elapsed_percent:.0}% elapsed, escalated to level {}",
                    rule.level
                ))
                .automatic(true),
        );

        let mut notify: Vec<UserId> = rule.notify_user_ids.clone();
        if let Some(fallback) = rule.reassign_to {
            if !notify.contains(&fallback) {
                notify.push(fallback);
            }
        }
        if !notify.is_empty() {
            uow.notify(
                Audience::Users(notify),
                format!("[{number}] SLA escalation level {}", rule.level),
                format!("\"{title}\" has used {elapsed_percent:.0}% of its resolution time."),
            );
        }
        true
    }

    // ========================================================================
    // Field edits
    // ========================================================================

    fn update_details(
        &self,
        uow: &mut UnitOfWork,
        patch: DetailsPatch,
        ctx: &ActionContext<'_>,
        facts: &Prefetched,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::EditGeneral)?;
        if patch.is_empty() {
            return Err(ServiceDeskError::InvalidInput("nothing to update".into()));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceDeskError::InvalidInput("title cannot be empty".into()));
        }
        if let Some(policy_id) = patch.sla_policy_id {
            if facts.new_policy.as_ref().map(|p| p.id) != Some(policy_id) {
                return Err(ServiceDeskError::NotFound(format!("SLA policy {policy_id}")));
            }
        }

        let fields = patch.field_names().join(", ");
        let request = &mut uow.request;
        if let Some(title) = patch.title {
            request.title = title;
        }
        if let Some(description) = patch.description {
            request.description = description;
        }
        if let Some(request_type) = patch.request_type {
            request.request_type = request_type;
        }
        if let Some(category) = patch.service_category {
            request.service_category = category;
        }
        if let Some(impact) = patch.impact {
            request.impact = Some(impact);
        }
        if let Some(urgency) = patch.urgency {
            request.urgency = Some(urgency);
        }
        if let Some(location) = patch.location {
            request.location = location;
        }
        if let Some(category) = patch.equipment_category_id {
            request.equipment_category_id = Some(category);
        }
        if let Some(policy_id) = patch.sla_policy_id {
            request.sla_policy_id = Some(policy_id);
        }

        uow.touched = true;
        uow.history.push(
            HistoryDraft::new(uow.request.id, HistoryEventType::FieldChange)
                .actor(Some(ctx.actor.user_id))
                .note(format!("Updated {fields}")),
        );
        Ok(())
    }

    fn update_resolution(
        &self,
        uow: &mut UnitOfWork,
        patch: ResolutionPatch,
        ctx: &ActionContext<'_>,
    ) -> Result<()> {
        self.check(uow, ctx, Permission::EditWorkFields)?;
        if patch == ResolutionPatch::default() {
            return Err(ServiceDeskError::InvalidInput("nothing to update".into()));
        }
        let mut fields = Vec::new();
        if let Some(notes) = patch.resolution_notes {
            uow.request.resolution_notes = Some(notes);
            fields.push("resolution_notes");
        }
        if let Some(cause) = patch.root_cause {
            uow.request.root_cause = Some(cause);
            fields.push("root_cause");
        }
        uow.touched = true;
        uow.history.push(
            HistoryDraft::new(uow.request.id, HistoryEventType::FieldChange)
                .actor(Some(ctx.actor.user_id))
                .note(format!("Updated {}", fields.join(", "))),
        );
        Ok(())
    }

    fn add_comment(&self, uow: &mut UnitOfWork, text: &str, ctx: &ActionContext<'_>) -> Result<()> {
        self.check(uow, ctx, Permission::Comment)?;
        let text = required_reason(text, "a comment")?;
        uow.history.push(
            HistoryDraft::new(uow.request.id, HistoryEventType::Comment)
                .actor(Some(ctx.actor.user_id))
                .note(text),
        );
        Ok(())
    }
}

/// Human-readable reference derived from the random tail of the id.
pub fn request_number(id: RequestId) -> String {
    let simple = id.simple().to_string().to_uppercase();
    let tail = &simple[simple.len() - 8..];
    format!("{REQUEST_NUMBER_PREFIX}{tail}")
}

fn required_reason<'a>(text: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ServiceDeskError::InvalidInput(format!("{what} requires a reason")))
    } else {
        Ok(trimmed)
    }
}

/// Distinct recipients, excluding the actor who triggered the message.
fn recipients<const N: usize>(candidates: [Option<UserId>; N], actor: &Actor) -> Vec<UserId> {
    let mut out = Vec::with_capacity(N);
    for user in candidates.into_iter().flatten() {
        if user != actor.user_id && !out.contains(&user) {
            out.push(user);
        }
    }
    out
}
