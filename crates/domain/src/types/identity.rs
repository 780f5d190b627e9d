//! Acting identities and roles

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{DepartmentId, TeamId, UserId};
use crate::impl_domain_code_conversions;

/// Organizational role. Permission checks only ever look at this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cto,
    DepartmentManager,
    TeamLeader,
    SeniorTechnician,
    Technician,
    Dispatcher,
}

impl_domain_code_conversions!(Role {
    Cto => "cto",
    DepartmentManager => "department_manager",
    TeamLeader => "team_leader",
    SeniorTechnician => "senior_technician",
    Technician => "technician",
    Dispatcher => "dispatcher",
});

/// The user performing an action, resolved fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: HashSet<Role>,
    pub team_ids: HashSet<TeamId>,
    pub department_id: Option<DepartmentId>,
}

impl Actor {
    /// An actor without roles, teams or department.
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, roles: HashSet::new(), team_ids: HashSet::new(), department_id: None }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn in_team(mut self, team_id: TeamId) -> Self {
        self.team_ids.insert(team_id);
        self
    }

    pub fn in_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }

    pub fn is_member_of(&self, team_id: Option<TeamId>) -> bool {
        team_id.is_some_and(|team| self.team_ids.contains(&team))
    }

    /// Holds `TeamLeader` and belongs to `team_id`.
    pub fn leads(&self, team_id: Option<TeamId>) -> bool {
        self.has_role(Role::TeamLeader) && self.is_member_of(team_id)
    }
}
