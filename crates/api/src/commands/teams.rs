//! Team registry commands

use servicedesk_core::{TeamDirectory, TeamRegistry};
use servicedesk_domain::{Result, Team, TeamId, TeamMember, UserId};

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

/// Insert or update a team; the stored copy carries the recomputed path.
pub async fn save_team(ctx: &AppContext, team: Team) -> Result<Team> {
    execute_command("teams::save_team", || async { ctx.teams.save_team(&team).await }).await
}

pub async fn set_team_parent(
    ctx: &AppContext,
    team_id: TeamId,
    parent_id: Option<TeamId>,
) -> Result<Team> {
    execute_command("teams::set_team_parent", || async {
        ctx.teams.set_parent(team_id, parent_id).await
    })
    .await
}

pub async fn set_default_team(ctx: &AppContext, team_id: TeamId) -> Result<()> {
    execute_command("teams::set_default_team", || async {
        ctx.teams.set_default_team(team_id).await
    })
    .await
}

pub async fn save_team_member(ctx: &AppContext, member: TeamMember) -> Result<()> {
    execute_command("teams::save_team_member", || async { ctx.teams.save_member(&member).await })
        .await
}

pub async fn remove_team_member(ctx: &AppContext, team_id: TeamId, user_id: UserId) -> Result<()> {
    execute_command("teams::remove_team_member", || async {
        ctx.teams.remove_member(team_id, user_id).await
    })
    .await
}

pub async fn list_team_members(ctx: &AppContext, team_id: TeamId) -> Result<Vec<TeamMember>> {
    execute_command("teams::list_team_members", || async { ctx.teams.members(team_id).await })
        .await
}
