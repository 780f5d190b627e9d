//! Permission evaluation
//!
//! A pure function of the actor's roles, ownership, team memberships and the
//! request stage. Requests in a terminal-for-editing stage are read-only for
//! everyone; only the approval decisions remain available there.

use serde::Serialize;
use servicedesk_domain::{
    Actor, Result, Role, ServiceDeskError, ServiceRequest, Stage, TeamId,
};

/// Actions currently permitted for one actor on one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    pub can_put_on_hold: bool,
    pub can_resume_from_hold: bool,
    pub can_send_for_approval: bool,
    pub can_approve: bool,
    pub can_reject: bool,
    pub can_cancel: bool,
    pub can_create_work_order: bool,
    pub can_manage_work: bool,
    pub can_assign_team: bool,
    pub can_assign_technician: bool,
    pub can_edit_general: bool,
    pub can_edit_work_fields: bool,
    pub can_escalate: bool,
    pub can_comment: bool,
    pub is_read_only: bool,
}

/// Names the permission an action needs, for `check` and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    PutOnHold,
    ResumeFromHold,
    SendForApproval,
    Approve,
    Reject,
    Cancel,
    CreateWorkOrder,
    ManageWork,
    AssignTeam,
    AssignTechnician,
    EditGeneral,
    EditWorkFields,
    Escalate,
    Comment,
}

impl Permission {
    fn label(self) -> &'static str {
        match self {
            Self::PutOnHold => "put on hold",
            Self::ResumeFromHold => "resume from hold",
            Self::SendForApproval => "send for approval",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::CreateWorkOrder => "create work orders",
            Self::ManageWork => "manage work orders",
            Self::AssignTeam => "assign a team",
            Self::AssignTechnician => "assign a technician",
            Self::EditGeneral => "edit request details",
            Self::EditWorkFields => "edit resolution fields",
            Self::Escalate => "escalate",
            Self::Comment => "comment",
        }
    }
}

impl PermissionSet {
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::PutOnHold => self.can_put_on_hold,
            Permission::ResumeFromHold => self.can_resume_from_hold,
            Permission::SendForApproval => self.can_send_for_approval,
            Permission::Approve => self.can_approve,
            Permission::Reject => self.can_reject,
            Permission::Cancel => self.can_cancel,
            Permission::CreateWorkOrder => self.can_create_work_order,
            Permission::ManageWork => self.can_manage_work,
            Permission::AssignTeam => self.can_assign_team,
            Permission::AssignTechnician => self.can_assign_technician,
            Permission::EditGeneral => self.can_edit_general,
            Permission::EditWorkFields => self.can_edit_work_fields,
            Permission::Escalate => self.can_escalate,
            Permission::Comment => self.can_comment,
        }
    }
}

const ANY_MANAGER: &[Role] = &[Role::Cto, Role::DepartmentManager];
const MANAGER_OR_DISPATCHER: &[Role] = &[Role::Cto, Role::DepartmentManager, Role::Dispatcher];
const TECHNICAL: &[Role] = &[Role::TeamLeader, Role::SeniorTechnician, Role::Technician];

#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// `effective_team` is the team the request currently belongs to: the
    /// default routing team while `New`, the assigned team afterwards.
    pub fn permissions(
        &self,
        actor: &Actor,
        request: &ServiceRequest,
        effective_team: Option<TeamId>,
    ) -> PermissionSet {
        let stage = request.stage;
        let read_only = stage.is_terminal();
        let is_owner = request.is_owner(actor.user_id);
        let leads_team = actor.leads(effective_team);
        let is_assigned_technician = request.technician_id == Some(actor.user_id);
        let privileged = actor.has_any_role(MANAGER_OR_DISPATCHER);

        let hold_rights =
            leads_team || actor.has_role(Role::SeniorTechnician) || is_assigned_technician;

        let decides_approval = stage == Stage::PendingApproval
            && (actor.has_role(Role::Cto)
                || (actor.has_role(Role::DepartmentManager) && same_department(actor, request))
                || (request.pending_cancel && is_owner));

        let work_fields =
            !read_only && (actor.has_any_role(TECHNICAL) || is_assigned_technician);

        let general_fields = !read_only
            && if stage == Stage::New {
                is_owner || actor.has_any_role(MANAGER_OR_DISPATCHER)
            } else {
                actor.has_any_role(ANY_MANAGER)
            };

        PermissionSet {
            can_put_on_hold: !read_only && stage != Stage::OnHold && hold_rights,
            can_resume_from_hold: stage == Stage::OnHold && hold_rights,
            can_send_for_approval: stage == Stage::InProgress
                && (privileged || leads_team || is_assigned_technician),
            can_approve: decides_approval,
            can_reject: decides_approval,
            can_cancel: matches!(stage, Stage::New | Stage::TeamAssigned)
                && (privileged || leads_team || (is_owner && stage == Stage::New)),
            can_create_work_order: matches!(
                stage,
                Stage::TeamAssigned | Stage::InProgress | Stage::WorkOrderCreated
            ) && (privileged || leads_team),
            can_manage_work: work_fields,
            can_assign_team: !read_only && privileged,
            can_assign_technician: !read_only && (privileged || leads_team),
            can_edit_general: general_fields,
            can_edit_work_fields: work_fields,
            can_escalate: !read_only && (is_owner || privileged || leads_team),
            can_comment: !read_only && (is_owner || !actor.roles.is_empty()),
            is_read_only: read_only,
        }
    }

    /// Whether `actor` may move `request` to `target`.
    ///
    /// Automatic transitions are authorized by the field mutation that
    /// triggered them, so they only require the request to be editable.
    pub fn can_transition(
        &self,
        actor: &Actor,
        request: &ServiceRequest,
        effective_team: Option<TeamId>,
        target: Stage,
        is_automatic: bool,
    ) -> bool {
        let permissions = self.permissions(actor, request, effective_team);
        if is_automatic {
            return !permissions.is_read_only;
        }

        let from = request.stage;
        match target {
            Stage::OnHold => permissions.can_put_on_hold,
            Stage::PendingApproval => {
                permissions.can_send_for_approval || permissions.can_cancel
            }
            Stage::Completed => permissions.can_approve,
            Stage::Rejected => permissions.can_reject,
            Stage::Cancelled if from == Stage::PendingApproval => permissions.can_approve,
            Stage::Cancelled => permissions.can_cancel,
            Stage::InProgress if from == Stage::OnHold => {
                permissions.can_resume_from_hold || permissions.can_manage_work
            }
            Stage::InProgress => permissions.can_manage_work,
            Stage::New | Stage::TeamAssigned if from == Stage::PendingApproval => {
                permissions.can_reject
            }
            Stage::New | Stage::TeamAssigned | Stage::WorkOrderCreated
                if from == Stage::OnHold =>
            {
                permissions.can_resume_from_hold
            }
            Stage::TeamAssigned => permissions.can_assign_team,
            Stage::WorkOrderCreated => permissions.can_create_work_order,
            Stage::New => false,
        }
    }

    /// Fails with `PermissionDenied` unless `permission` is granted.
    ///
    /// # Errors
    /// Returns `ServiceDeskError::PermissionDenied` naming the action and stage.
    pub fn check(
        &self,
        actor: &Actor,
        request: &ServiceRequest,
        effective_team: Option<TeamId>,
        permission: Permission,
    ) -> Result<()> {
        if self.permissions(actor, request, effective_team).allows(permission) {
            Ok(())
        } else {
            Err(ServiceDeskError::PermissionDenied(format!(
                "user {} may not {} request {} in stage {}",
                actor.user_id,
                permission.label(),
                request.number,
                request.stage
            )))
        }
    }
}

fn same_department(actor: &Actor, request: &ServiceRequest) -> bool {
    matches!((actor.department_id, request.department_id), (Some(a), Some(b)) if a == b)
}
