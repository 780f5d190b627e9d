//! Teams and team members

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CampusId, CategoryId, CompanyId, TeamId, UserId};
use crate::impl_domain_code_conversions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    #[default]
    RoundRobin,
    LeastLoaded,
    SkillBased,
    LocationBased,
}

impl_domain_code_conversions!(AssignmentMethod {
    RoundRobin => "round_robin",
    LeastLoaded => "least_loaded",
    SkillBased => "skill_based",
    LocationBased => "location_based",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    TeamLeader,
    SeniorTechnician,
    #[default]
    Technician,
}

impl_domain_code_conversions!(MemberRole {
    TeamLeader => "team_leader",
    SeniorTechnician => "senior_technician",
    Technician => "technician",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Junior,
    #[default]
    Mid,
    Senior,
    Expert,
}

impl_domain_code_conversions!(SkillLevel {
    Junior => "junior",
    Mid => "mid",
    Senior => "senior",
    Expert => "expert",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Available,
    Busy,
    OnLeave,
    OffDuty,
}

impl_domain_code_conversions!(Availability {
    Available => "available",
    Busy => "busy",
    OnLeave => "on_leave",
    OffDuty => "off_duty",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub company_id: Option<CompanyId>,
    pub department_manager_id: Option<UserId>,
    pub parent_id: Option<TeamId>,
    /// Ancestor path including this team, e.g. `/root/child/`.
    pub hierarchy_path: String,
    pub is_default_assignment_team: bool,
    pub auto_assign: bool,
    pub assignment_method: AssignmentMethod,
    pub active: bool,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            company_id: None,
            department_manager_id: None,
            parent_id: None,
            hierarchy_path: format!("/{id}/"),
            is_default_assignment_team: false,
            auto_assign: false,
            assignment_method: AssignmentMethod::default(),
            active: true,
        }
    }

    /// Number of teams on the path from the root to this team.
    pub fn depth(&self) -> usize {
        self.hierarchy_path.split('/').filter(|segment| !segment.is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub skill_level: SkillLevel,
    pub skill_category_ids: BTreeSet<CategoryId>,
    pub coverage_campus_ids: BTreeSet<CampusId>,
    pub availability: Availability,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

impl TeamMember {
    pub fn new(team_id: TeamId, user_id: UserId, role: MemberRole) -> Self {
        Self {
            team_id,
            user_id,
            role,
            skill_level: SkillLevel::default(),
            skill_category_ids: BTreeSet::new(),
            coverage_campus_ids: BTreeSet::new(),
            availability: Availability::Available,
            last_assigned_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}
