//! Port interfaces for identity and roles
//!
//! Roles and memberships are facts supplied per call; the core never caches
//! them across actions.

use std::collections::HashSet;

use async_trait::async_trait;
use servicedesk_domain::{Actor, DepartmentId, Result, Role, TeamId, UserId};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Roles held by the user. Unknown users have no roles.
    async fn roles_of(&self, user_id: UserId) -> Result<HashSet<Role>>;

    /// Teams the user belongs to.
    async fn team_memberships_of(&self, user_id: UserId) -> Result<HashSet<TeamId>>;

    async fn department_of(&self, user_id: UserId) -> Result<Option<DepartmentId>>;

    /// Users holding `role`, used to find fallback approvers.
    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>>;

    /// Build the acting identity from the three lookups above.
    async fn resolve(&self, user_id: UserId) -> Result<Actor> {
        Ok(Actor {
            user_id,
            roles: self.roles_of(user_id).await?,
            team_ids: self.team_memberships_of(user_id).await?,
            department_id: self.department_of(user_id).await?,
        })
    }
}
