//! SQLite implementation of the `IdentityProvider` port.
//!
//! Users and role grants are owned by this table set; team memberships are
//! read from `team_members` so the directory and identity never disagree.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use servicedesk_core::IdentityProvider;
use servicedesk_domain::{DepartmentId, Result as DomainResult, Role, TeamId, UserId};
use tokio::task;

use super::manager::DbManager;
use super::sql::{code_at, opt_id, opt_uuid_at, uuid_at};
use crate::errors::conversions::to_domain;

/// A directory user with the roles granted to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub display_name: String,
    pub department_id: Option<DepartmentId>,
    pub roles: BTreeSet<Role>,
}

pub struct SqliteIdentityProvider {
    db: Arc<DbManager>,
}

impl SqliteIdentityProvider {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or update a user and replace their role grants.
    pub async fn save_user(&self, user: &DirectoryUser) -> DomainResult<()> {
        let user = user.clone();
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(to_domain)?;
            tx.execute(
                "INSERT INTO users (id, display_name, department_id) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name, \
                 department_id = excluded.department_id",
                params![user.id.to_string(), user.display_name, opt_id(user.department_id)],
            )
            .map_err(to_domain)?;
            tx.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user.id.to_string()])
                .map_err(to_domain)?;
            for role in &user.roles {
                tx.execute(
                    "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
                    params![user.id.to_string(), role.code()],
                )
                .map_err(to_domain)?;
            }
            tx.commit().map_err(to_domain)
        })
        .await
        .map_err(to_domain)?
    }

    pub async fn user(&self, user_id: UserId) -> DomainResult<Option<DirectoryUser>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Option<DirectoryUser>> {
            let conn = db.get_connection()?;
            let row = conn
                .query_row(
                    "SELECT display_name, department_id FROM users WHERE id = ?1 AND active = 1",
                    params![user_id.to_string()],
                    |row| Ok((row.get::<_, String>(0)?, opt_uuid_at(row, 1)?)),
                )
                .optional()
                .map_err(to_domain)?;
            let Some((display_name, department_id)) = row else {
                return Ok(None);
            };
            let roles = select_roles(&conn, user_id)?;
            Ok(Some(DirectoryUser {
                id: user_id,
                display_name,
                department_id,
                roles: roles.into_iter().collect(),
            }))
        })
        .await
        .map_err(to_domain)?
    }
}

fn select_roles(conn: &rusqlite::Connection, user_id: UserId) -> DomainResult<Vec<Role>> {
    let mut stmt = conn
        .prepare(
            "SELECT r.role FROM user_roles r JOIN users u ON u.id = r.user_id \
             WHERE r.user_id = ?1 AND u.active = 1",
        )
        .map_err(to_domain)?;
    let rows = stmt.query_map(params![user_id.to_string()], |row| code_at(row, 0)).map_err(to_domain)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)
}

#[async_trait]
impl IdentityProvider for SqliteIdentityProvider {
    async fn roles_of(&self, user_id: UserId) -> DomainResult<HashSet<Role>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<HashSet<Role>> {
            let conn = db.get_connection()?;
            Ok(select_roles(&conn, user_id)?.into_iter().collect())
        })
        .await
        .map_err(to_domain)?
    }

    async fn team_memberships_of(&self, user_id: UserId) -> DomainResult<HashSet<TeamId>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<HashSet<TeamId>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT m.team_id FROM team_members m JOIN teams t ON t.id = m.team_id \
                     WHERE m.user_id = ?1 AND t.active = 1",
                )
                .map_err(to_domain)?;
            let rows =
                stmt.query_map(params![user_id.to_string()], |row| uuid_at(row, 0)).map_err(to_domain)?;
            rows.collect::<rusqlite::Result<HashSet<_>>>().map_err(to_domain)
        })
        .await
        .map_err(to_domain)?
    }

    async fn department_of(&self, user_id: UserId) -> DomainResult<Option<DepartmentId>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Option<DepartmentId>> {
            let conn = db.get_connection()?;
            let department = conn
                .query_row(
                    "SELECT department_id FROM users WHERE id = ?1",
                    params![user_id.to_string()],
                    |row| opt_uuid_at(row, 0),
                )
                .optional()
                .map_err(to_domain)?;
            Ok(department.flatten())
        })
        .await
        .map_err(to_domain)?
    }

    async fn users_with_role(&self, role: Role) -> DomainResult<Vec<UserId>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Vec<UserId>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT r.user_id FROM user_roles r JOIN users u ON u.id = r.user_id \
                     WHERE r.role = ?1 AND u.active = 1 ORDER BY u.rowid",
                )
                .map_err(to_domain)?;
            let rows = stmt.query_map(params![role.code()], |row| uuid_at(row, 0)).map_err(to_domain)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)
        })
        .await
        .map_err(to_domain)?
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn provider() -> (TempDir, SqliteIdentityProvider) {
        let dir = TempDir::new().unwrap();
        let db = DbManager::new(dir.path().join("identity.db"), 2).unwrap();
        db.run_migrations().unwrap();
        (dir, SqliteIdentityProvider::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn unknown_users_have_no_roles() {
        let (_dir, provider) = provider();
        let stranger = Uuid::now_v7();

        let actor = provider.resolve(stranger).await.unwrap();

        assert!(actor.roles.is_empty());
        assert!(actor.team_ids.is_empty());
        assert_eq!(actor.department_id, None);
        assert!(provider.user(stranger).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_a_user_replaces_role_grants() {
        let (_dir, provider) = provider();
        let department = Uuid::now_v7();
        let mut user = DirectoryUser {
            id: Uuid::now_v7(),
            display_name: "Ayse".into(),
            department_id: Some(department),
            roles: [Role::Dispatcher, Role::Technician].into_iter().collect(),
        };
        provider.save_user(&user).await.unwrap();
        assert_eq!(provider.users_with_role(Role::Dispatcher).await.unwrap(), vec![user.id]);

        user.roles = [Role::Cto].into_iter().collect();
        provider.save_user(&user).await.unwrap();

        let roles = provider.roles_of(user.id).await.unwrap();
        assert_eq!(roles, [Role::Cto].into_iter().collect());
        assert!(provider.users_with_role(Role::Dispatcher).await.unwrap().is_empty());
        assert_eq!(provider.department_of(user.id).await.unwrap(), Some(department));
        assert_eq!(provider.user(user.id).await.unwrap(), Some(user));
    }
}
