//! Service request aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;
use super::work_order::{WorkOrder, WorkStatus};
use super::{
    CampusId, CategoryId, CompanyId, DepartmentId, RequestId, SlaPolicyId, TeamId, UserId,
};
use crate::impl_domain_code_conversions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    #[default]
    Incident,
    ServiceRequest,
    Preventive,
    Installation,
}

impl_domain_code_conversions!(RequestType {
    Incident => "incident",
    ServiceRequest => "service_request",
    Preventive => "preventive",
    Installation => "installation",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    #[default]
    It,
    Technical,
    Facility,
}

impl_domain_code_conversions!(ServiceCategory {
    It => "it",
    Technical => "technical",
    Facility => "facility",
});

/// Impact or urgency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
    Critical,
}

impl_domain_code_conversions!(Level {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// P1 is the most urgent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityLevel {
    P1,
    P2,
    #[default]
    P3,
    P4,
}

impl_domain_code_conversions!(PriorityLevel {
    P1 => "p1",
    P2 => "p2",
    P3 => "p3",
    P4 => "p4",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    #[default]
    OnTrack,
    AtRisk,
    Breached,
}

impl_domain_code_conversions!(SlaStatus {
    OnTrack => "on_track",
    AtRisk => "at_risk",
    Breached => "breached",
});

/// Where the work happens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub campus_id: Option<CampusId>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
}

/// A service request and the work orders it owns.
///
/// `stage` is only ever changed by the transition engine. `priority`,
/// deadlines and `sla_status` are derived by the SLA calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub number: String,
    pub title: String,
    pub description: String,
    pub request_type: RequestType,
    pub service_category: ServiceCategory,
    pub impact: Option<Level>,
    pub urgency: Option<Level>,
    pub priority: PriorityLevel,
    pub stage: Stage,
    pub owner_id: UserId,
    pub company_id: Option<CompanyId>,
    pub department_id: Option<DepartmentId>,
    pub location: Location,
    pub equipment_category_id: Option<CategoryId>,
    pub assigned_team_id: Option<TeamId>,
    pub technician_id: Option<UserId>,
    pub sla_policy_id: Option<SlaPolicyId>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub resolution_deadline: Option<DateTime<Utc>>,
    pub sla_status: SlaStatus,
    pub pending_cancel: bool,
    pub cancel_reason: Option<String>,
    pub cancel_requested_by: Option<UserId>,
    pub previous_stage: Option<Stage>,
    pub hold_reason: Option<String>,
    pub expected_resume_at: Option<DateTime<Utc>>,
    pub resume_stage: Option<Stage>,
    pub escalation_level: u32,
    pub escalated_to: Option<UserId>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub root_cause: Option<String>,
    pub replaces: Option<RequestId>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub technician_assigned_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every commit.
    pub version: u64,
    pub work_orders: Vec<WorkOrder>,
}

impl ServiceRequest {
    /// Build a fresh request in `New` from a draft.
    pub fn from_draft(
        id: RequestId,
        number: String,
        owner_id: UserId,
        draft: RequestDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            title: draft.title,
            description: draft.description,
            request_type: draft.request_type,
            service_category: draft.service_category,
            impact: draft.impact,
            urgency: draft.urgency,
            priority: PriorityLevel::default(),
            stage: Stage::New,
            owner_id,
            company_id: draft.company_id,
            department_id: draft.department_id,
            location: draft.location,
            equipment_category_id: draft.equipment_category_id,
            assigned_team_id: None,
            technician_id: None,
            sla_policy_id: draft.sla_policy_id,
            response_deadline: None,
            resolution_deadline: None,
            sla_status: SlaStatus::OnTrack,
            pending_cancel: false,
            cancel_reason: None,
            cancel_requested_by: None,
            previous_stage: None,
            hold_reason: None,
            expected_resume_at: None,
            resume_stage: None,
            escalation_level: 0,
            escalated_to: None,
            escalated_at: None,
            resolution_notes: None,
            root_cause: None,
            replaces: None,
            created_at,
            assigned_at: None,
            technician_assigned_at: None,
            closed_at: None,
            version: 0,
            work_orders: Vec::new(),
        }
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    pub fn work_order(&self, id: super::WorkOrderId) -> Option<&WorkOrder> {
        self.work_orders.iter().find(|wo| wo.id == id)
    }

    pub fn work_order_mut(&mut self, id: super::WorkOrderId) -> Option<&mut WorkOrder> {
        self.work_orders.iter_mut().find(|wo| wo.id == id)
    }

    /// Vacuously true for a request without work orders.
    pub fn all_work_orders_completed(&self) -> bool {
        self.work_orders.iter().all(|wo| wo.status == WorkStatus::Completed)
    }

    pub fn clear_cancel_request(&mut self) {
        self.pending_cancel = false;
        self.cancel_reason = None;
        self.cancel_requested_by = None;
        self.previous_stage = None;
    }

    pub fn clear_hold(&mut self) {
        self.hold_reason = None;
        self.expected_resume_at = None;
        self.resume_stage = None;
    }
}

/// Input for `CreateRequest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDraft {
    pub title: String,
    pub description: String,
    pub request_type: RequestType,
    pub service_category: ServiceCategory,
    pub impact: Option<Level>,
    pub urgency: Option<Level>,
    pub company_id: Option<CompanyId>,
    pub department_id: Option<DepartmentId>,
    pub location: Location,
    pub equipment_category_id: Option<CategoryId>,
    /// Explicit policy; when absent the applicable policy is resolved.
    pub sla_policy_id: Option<SlaPolicyId>,
}

/// Title and description for the request spawned when a completion is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementDraft {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// General fields. Only the fields that are `Some` change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailsPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub request_type: Option<RequestType>,
    pub service_category: Option<ServiceCategory>,
    pub impact: Option<Level>,
    pub urgency: Option<Level>,
    pub location: Option<Location>,
    pub equipment_category_id: Option<CategoryId>,
    pub sla_policy_id: Option<SlaPolicyId>,
}

impl DetailsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the fields this patch touches, for the audit note.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.description.is_some() {
            names.push("description");
        }
        if self.request_type.is_some() {
            names.push("request_type");
        }
        if self.service_category.is_some() {
            names.push("service_category");
        }
        if self.impact.is_some() {
            names.push("impact");
        }
        if self.urgency.is_some() {
            names.push("urgency");
        }
        if self.location.is_some() {
            names.push("location");
        }
        if self.equipment_category_id.is_some() {
            names.push("equipment_category");
        }
        if self.sla_policy_id.is_some() {
            names.push("sla_policy");
        }
        names
    }
}

/// Resolution fields, editable by the technical roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionPatch {
    pub resolution_notes: Option<String>,
    pub root_cause: Option<String>,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn new_request_starts_clean() {
        let owner = Uuid::now_v7();
        let draft = RequestDraft { title: "Projector broken".into(), ..RequestDraft::default() };
        let request = ServiceRequest::from_draft(Uuid::now_v7(), "REQ-1".into(), owner, draft, Utc::now());

        assert_eq!(request.stage, Stage::New);
        assert!(request.is_owner(owner));
        assert_eq!(request.escalation_level, 0);
        assert!(request.all_work_orders_completed());
        assert_eq!(request.sla_status, SlaStatus::OnTrack);
    }

    #[test]
    fn patch_lists_touched_fields() {
        let patch = DetailsPatch {
            impact: Some(Level::High),
            title: Some("x".into()),
            ..DetailsPatch::default()
        };
        assert_eq!(patch.field_names(), vec!["title", "impact"]);
        assert!(!patch.is_empty());
        assert!(DetailsPatch::default().is_empty());
    }
}
