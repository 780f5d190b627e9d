//! Team assignment resolver
//!
//! Resolves which team owns a request and picks technicians for teams that
//! enable auto-assignment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use servicedesk_domain::{CompanyId, Result, ServiceRequest, Stage, Team, TeamId, UserId};
use tracing::{debug, warn};

use super::ports::TeamDirectory;
use super::strategy::{pick_technician, Candidate};
use crate::workflow::ports::RequestStore;

pub struct TeamAssignmentResolver {
    directory: Arc<dyn TeamDirectory>,
    requests: Arc<dyn RequestStore>,
}

impl TeamAssignmentResolver {
    pub fn new(directory: Arc<dyn TeamDirectory>, requests: Arc<dyn RequestStore>) -> Self {
        Self { directory, requests }
    }

    pub fn directory(&self) -> &Arc<dyn TeamDirectory> {
        &self.directory
    }

    /// The flagged default team, else the requester's company team, else any
    /// active team.
    pub async fn default_team(&self, company_id: Option<CompanyId>) -> Result<Option<TeamId>> {
        if let Some(team) = self.directory.default_team().await? {
            return Ok(Some(team.id));
        }
        if let Some(company_id) = company_id {
            if let Some(team) = self.directory.company_team(company_id).await? {
                debug!(%company_id, team_id = %team.id, "routing to company team");
                return Ok(Some(team.id));
            }
        }
        let fallback = self.directory.any_team().await?.map(|team| team.id);
        if fallback.is_none() {
            warn!("no active team available for default routing");
        }
        Ok(fallback)
    }

    /// Default routing team while the request is `New`, the assigned team
    /// afterwards.
    pub async fn effective_team(&self, request: &ServiceRequest) -> Result<Option<TeamId>> {
        if request.stage == Stage::New {
            self.default_team(request.company_id).await
        } else {
            Ok(request.assigned_team_id)
        }
    }

    /// Pick a technician from `team` with the team's strategy.
    ///
    /// Returns `None` when the team disables auto-assignment or has no
    /// available member.
    pub async fn auto_assign_technician(
        &self,
        team: &Team,
        request: &ServiceRequest,
    ) -> Result<Option<UserId>> {
        if !team.auto_assign || !team.active {
            return Ok(None);
        }

        let members = self.directory.members(team.id).await?;
        let mut candidates = Vec::with_capacity(members.len());
        for member in members.iter().filter(|m| m.is_available()) {
            let active_requests = self.requests.count_active_for_technician(member.user_id).await?;
            candidates.push(Candidate { member, active_requests });
        }

        let picked = pick_technician(team.assignment_method, &candidates, request);
        debug!(
            team_id = %team.id,
            method = %team.assignment_method,
            candidates = candidates.len(),
            picked = ?picked,
            "auto-assignment evaluated"
        );
        Ok(picked)
    }

    /// Stamp the round-robin bookkeeping after an assignment committed.
    pub async fn record_assignment(
        &self,
        team_id: TeamId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.directory.record_assignment(team_id, user_id, at).await
    }

    /// Team leader of `team_id`, falling back to its department manager.
    pub async fn escalation_contact(&self, team_id: Option<TeamId>) -> Result<Option<UserId>> {
        let Some(team_id) = team_id else {
            return Ok(None);
        };
        let members = self.directory.members(team_id).await?;
        if let Some(leader) =
            members.iter().find(|m| m.role == servicedesk_domain::MemberRole::TeamLeader)
        {
            return Ok(Some(leader.user_id));
        }
        Ok(self.directory.team(team_id).await?.and_then(|team| team.department_manager_id))
    }
}
