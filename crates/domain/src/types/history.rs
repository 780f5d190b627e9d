//! Audit ledger entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;
use super::work_order::WorkStatus;
use super::{HistoryEntryId, RequestId, TeamId, UserId, WorkOrderId};
use crate::impl_domain_code_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    StageChange,
    Assignment,
    WorkOrder,
    Comment,
    Approval,
    Cancellation,
    Hold,
    FieldChange,
    Escalation,
}

impl_domain_code_conversions!(HistoryEventType {
    StageChange => "stage_change",
    Assignment => "assignment",
    WorkOrder => "work_order",
    Comment => "comment",
    Approval => "approval",
    Cancellation => "cancellation",
    Hold => "hold",
    FieldChange => "field_change",
    Escalation => "escalation",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
    Cancelled,
}

impl_domain_code_conversions!(ApprovalStatus {
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

/// Immutable audit record. Never updated; removed only with its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<UserId>,
    pub event_type: HistoryEventType,
    pub old_stage: Option<Stage>,
    pub new_stage: Option<Stage>,
    pub old_team: Option<TeamId>,
    pub new_team: Option<TeamId>,
    pub old_technician: Option<UserId>,
    pub new_technician: Option<UserId>,
    pub approval_status: Option<ApprovalStatus>,
    pub work_order_id: Option<WorkOrderId>,
    pub work_order_status: Option<WorkStatus>,
    pub note: String,
    pub is_automatic: bool,
}

impl HistoryEntry {
    /// The stage move this entry records, if any.
    pub fn stage_move(&self) -> Option<(Stage, Stage)> {
        match (self.old_stage, self.new_stage) {
            (Some(old), Some(new)) if old != new => Some((old, new)),
            _ => None,
        }
    }
}

/// An entry before the ledger stamps its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDraft {
    pub request_id: RequestId,
    pub actor_id: Option<UserId>,
    pub event_type: HistoryEventType,
    pub old_stage: Option<Stage>,
    pub new_stage: Option<Stage>,
    pub old_team: Option<TeamId>,
    pub new_team: Option<TeamId>,
    pub old_technician: Option<UserId>,
    pub new_technician: Option<UserId>,
    pub approval_status: Option<ApprovalStatus>,
    pub work_order_id: Option<WorkOrderId>,
    pub work_order_status: Option<WorkStatus>,
    pub note: String,
    pub is_automatic: bool,
}

impl HistoryDraft {
    pub fn new(request_id: RequestId, event_type: HistoryEventType) -> Self {
        Self {
            request_id,
            actor_id: None,
            event_type,
            old_stage: None,
            new_stage: None,
            old_team: None,
            new_team: None,
            old_technician: None,
            new_technician: None,
            approval_status: None,
            work_order_id: None,
            work_order_status: None,
            note: String::new(),
            is_automatic: false,
        }
    }

    pub fn actor(mut self, actor_id: Option<UserId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn stages(mut self, old: Stage, new: Stage) -> Self {
        self.old_stage = Some(old);
        self.new_stage = Some(new);
        self
    }

    pub fn teams(mut self, old: Option<TeamId>, new: Option<TeamId>) -> Self {
        self.old_team = old;
        self.new_team = new;
        self
    }

    pub fn technicians(mut self, old: Option<UserId>, new: Option<UserId>) -> Self {
        self.old_technician = old;
        self.new_technician = new;
        self
    }

    pub fn approval(mut self, status: ApprovalStatus) -> Self {
        self.approval_status = Some(status);
        self
    }

    pub fn work_order(mut self, id: WorkOrderId, status: WorkStatus) -> Self {
        self.work_order_id = Some(id);
        self.work_order_status = Some(status);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn automatic(mut self, is_automatic: bool) -> Self {
        self.is_automatic = is_automatic;
        self
    }

    pub fn into_entry(self, id: HistoryEntryId, timestamp: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            id,
            request_id: self.request_id,
            timestamp,
            actor_id: self.actor_id,
            event_type: self.event_type,
            old_stage: self.old_stage,
            new_stage: self.new_stage,
            old_team: self.old_team,
            new_team: self.new_team,
            old_technician: self.old_technician,
            new_technician: self.new_technician,
            approval_status: self.approval_status,
            work_order_id: self.work_order_id,
            work_order_status: self.work_order_status,
            note: self.note,
            is_automatic: self.is_automatic,
        }
    }
}
