//! Domain types and models

pub mod history;
pub mod identity;
pub mod request;
pub mod sla;
pub mod stage;
pub mod team;
pub mod work_order;

use uuid::Uuid;

pub use history::{ApprovalStatus, HistoryDraft, HistoryEntry, HistoryEventType};
pub use identity::{Actor, Role};
pub use request::{
    DetailsPatch, Level, Location, PriorityLevel, ReplacementDraft, RequestDraft, RequestType,
    ResolutionPatch, ServiceCategory, ServiceRequest, SlaStatus,
};
pub use sla::{BusinessHours, EscalationRule, SlaApplicability, SlaLine, SlaPolicy};
pub use stage::{Locale, Stage};
pub use team::{AssignmentMethod, Availability, MemberRole, SkillLevel, Team, TeamMember};
pub use work_order::{ChecklistItem, TimeLog, WorkOrder, WorkOrderDraft, WorkStatus};

pub type RequestId = Uuid;
pub type WorkOrderId = Uuid;
pub type UserId = Uuid;
pub type TeamId = Uuid;
pub type CompanyId = Uuid;
pub type DepartmentId = Uuid;
pub type CampusId = Uuid;
pub type CategoryId = Uuid;
pub type SlaPolicyId = Uuid;
pub type HistoryEntryId = Uuid;
