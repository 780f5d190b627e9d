//! Port interfaces for the team directory

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servicedesk_domain::{CompanyId, Result, Team, TeamId, TeamMember, UserId};

/// Read side, plus the assignment bookkeeping used by round-robin.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// The active team flagged as default assignment team.
    async fn default_team(&self) -> Result<Option<Team>>;

    /// First active team scoped to `company_id`.
    async fn company_team(&self, company_id: CompanyId) -> Result<Option<Team>>;

    /// Any active team, used as the last routing fallback.
    async fn any_team(&self) -> Result<Option<Team>>;

    async fn team(&self, team_id: TeamId) -> Result<Option<Team>>;

    async fn members(&self, team_id: TeamId) -> Result<Vec<TeamMember>>;

    /// Stamp `last_assigned_at` on the member.
    async fn record_assignment(
        &self,
        team_id: TeamId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Write side. Implementations enforce the team invariants inside one
/// transaction: a single default team, a single team leader per team and an
/// acyclic hierarchy no deeper than the configured maximum.
#[async_trait]
pub trait TeamRegistry: Send + Sync {
    /// Insert or update a team. The hierarchy path is recomputed from
    /// `parent_id`; the stored team is returned.
    async fn save_team(&self, team: &Team) -> Result<Team>;

    /// Move a team (and its subtree) under a new parent.
    async fn set_parent(&self, team_id: TeamId, parent_id: Option<TeamId>) -> Result<Team>;

    /// Make `team_id` the only default assignment team.
    async fn set_default_team(&self, team_id: TeamId) -> Result<()>;

    async fn save_member(&self, member: &TeamMember) -> Result<()>;

    async fn remove_member(&self, team_id: TeamId, user_id: UserId) -> Result<()>;
}
