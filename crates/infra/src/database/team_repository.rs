//! SQLite implementation of the team directory and registry ports.
//!
//! The write side runs every invariant check inside an immediate transaction:
//! one default team, one team leader per team, and an acyclic hierarchy no
//! deeper than `MAX_TEAM_HIERARCHY_DEPTH`. Moving a team rewrites the stored
//! path of every descendant in the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use servicedesk_core::assignment::hierarchy::{child_path, depth_of, rebase, validate_parent};
use servicedesk_core::{TeamDirectory, TeamRegistry};
use servicedesk_domain::{
    CompanyId, MemberRole, Result as DomainResult, ServiceDeskError, Team, TeamId, TeamMember,
    UserId,
};
use tokio::task;
use tracing::info;

use super::manager::DbManager;
use super::sql::{code_at, json_at, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts, uuid_at};
use crate::errors::InfraError;

type InfraResult<T> = std::result::Result<T, InfraError>;

const TEAM_COLUMNS: &str = "id, name, company_id, department_manager_id, parent_id, \
     hierarchy_path, is_default_assignment_team, auto_assign, assignment_method, active";

const MEMBER_COLUMNS: &str = "team_id, user_id, role, skill_level, skill_category_ids, \
     coverage_campus_ids, availability, last_assigned_at";

pub struct SqliteTeamRepository {
    db: Arc<DbManager>,
}

impl SqliteTeamRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn run<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> InfraResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<T> {
            let mut conn = db.get_connection()?;
            op(&mut *conn).map_err(ServiceDeskError::from)
        })
        .await
        .map_err(|e| ServiceDeskError::from(InfraError::from(e)))?
    }

    async fn find_team(&self, filter: &'static str, arg: Option<String>) -> DomainResult<Option<Team>> {
        self.run(move |conn| {
            let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE {filter} ORDER BY rowid LIMIT 1");
            let team = match arg {
                Some(value) => conn.query_row(&sql, params![value], map_team_row),
                None => conn.query_row(&sql, [], map_team_row),
            }
            .optional()?;
            Ok(team)
        })
        .await
    }
}

#[async_trait]
impl TeamDirectory for SqliteTeamRepository {
    async fn default_team(&self) -> DomainResult<Option<Team>> {
        self.find_team("is_default_assignment_team = 1 AND active = 1", None).await
    }

    async fn company_team(&self, company_id: CompanyId) -> DomainResult<Option<Team>> {
        self.find_team("company_id = ?1 AND active = 1", Some(company_id.to_string())).await
    }

    async fn any_team(&self) -> DomainResult<Option<Team>> {
        self.find_team("active = 1", None).await
    }

    async fn team(&self, team_id: TeamId) -> DomainResult<Option<Team>> {
        self.run(move |conn| load_team(conn, team_id)).await
    }

    async fn members(&self, team_id: TeamId) -> DomainResult<Vec<TeamMember>> {
        self.run(move |conn| {
            let sql =
                format!("SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = ?1 ORDER BY rowid");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![team_id.to_string()], map_member_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn record_assignment(
        &self,
        team_id: TeamId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE team_members SET last_assigned_at = ?3 WHERE team_id = ?1 AND user_id = ?2",
                params![team_id.to_string(), user_id.to_string(), ts(at)],
            )?;
            if updated == 0 {
                return Err(not_a_member(team_id, user_id).into());
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TeamRegistry for SqliteTeamRepository {
    async fn save_team(&self, team: &Team) -> DomainResult<Team> {
        if team.name.trim().is_empty() {
            return Err(ServiceDeskError::InvalidInput("team name is required".into()));
        }
        let team = team.clone();
        let saved = self
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let saved = save_team_tx(&tx, team)?;
                tx.commit()?;
                Ok(saved)
            })
            .await?;
        info!(team_id = %saved.id, path = %saved.hierarchy_path, "team saved");
        Ok(saved)
    }

    async fn set_parent(&self, team_id: TeamId, parent_id: Option<TeamId>) -> DomainResult<Team> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut team = load_team(&tx, team_id)?
                .ok_or_else(|| ServiceDeskError::NotFound(format!("team {team_id}")))?;
            team.parent_id = parent_id;
            let saved = save_team_tx(&tx, team)?;
            tx.commit()?;
            Ok(saved)
        })
        .await
    }

    async fn set_default_team(&self, team_id: TeamId) -> DomainResult<()> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if load_team(&tx, team_id)?.is_none() {
                return Err(ServiceDeskError::NotFound(format!("team {team_id}")).into());
            }
            tx.execute(
                "UPDATE teams SET is_default_assignment_team = 0 WHERE is_default_assignment_team = 1",
                [],
            )?;
            tx.execute(
                "UPDATE teams SET is_default_assignment_team = 1 WHERE id = ?1",
                params![team_id.to_string()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn save_member(&self, member: &TeamMember) -> DomainResult<()> {
        let member = member.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if load_team(&tx, member.team_id)?.is_none() {
                return Err(ServiceDeskError::NotFound(format!("team {}", member.team_id)).into());
            }
            if member.role == MemberRole::TeamLeader {
                let other: Option<String> = tx
                    .query_row(
                        "SELECT user_id FROM team_members \
                         WHERE team_id = ?1 AND role = ?2 AND user_id != ?3",
                        params![
                            member.team_id.to_string(),
                            MemberRole::TeamLeader.code(),
                            member.user_id.to_string()
                        ],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(leader) = other {
                    return Err(ServiceDeskError::InvalidInput(format!(
                        "team {} already has team leader {leader}",
                        member.team_id
                    ))
                    .into());
                }
            }
            upsert_member(&tx, &member)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove_member(&self, team_id: TeamId, user_id: UserId) -> DomainResult<()> {
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2",
                params![team_id.to_string(), user_id.to_string()],
            )?;
            if removed == 0 {
                return Err(not_a_member(team_id, user_id).into());
            }
            Ok(())
        })
        .await
    }
}

fn not_a_member(team_id: TeamId, user_id: UserId) -> ServiceDeskError {
    ServiceDeskError::NotFound(format!("user {user_id} is not a member of team {team_id}"))
}

/// Insert or update `team`, recomputing its path and rebasing its subtree.
fn save_team_tx(conn: &Connection, mut team: Team) -> InfraResult<Team> {
    if team.is_default_assignment_team {
        let other: Option<String> = conn
            .query_row(
                "SELECT id FROM teams WHERE is_default_assignment_team = 1 AND id != ?1",
                params![team.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(other) = other {
            return Err(ServiceDeskError::InvalidInput(format!(
                "team {other} is already the default assignment team"
            ))
            .into());
        }
    }

    let existing = load_team(conn, team.id)?;
    let descendants = match &existing {
        Some(current) => subtree_paths(conn, &current.hierarchy_path)?,
        None => Vec::new(),
    };

    let parent = match team.parent_id {
        Some(parent_id) => Some(
            load_team(conn, parent_id)?
                .ok_or_else(|| ServiceDeskError::NotFound(format!("parent team {parent_id}")))?,
        ),
        None => None,
    };
    if let (Some(parent), Some(current)) = (&parent, &existing) {
        let own_depth = depth_of(&current.hierarchy_path);
        let height = descendants
            .iter()
            .map(|(_, path)| depth_of(path).saturating_sub(own_depth))
            .max()
            .unwrap_or(0);
        validate_parent(team.id, parent, height)?;
    } else if let Some(parent) = &parent {
        validate_parent(team.id, parent, 0)?;
    }
    team.hierarchy_path = child_path(parent.as_ref(), team.id);

    let sql = format!(
        "INSERT INTO teams ({TEAM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, company_id = excluded.company_id, \
         department_manager_id = excluded.department_manager_id, parent_id = excluded.parent_id, \
         hierarchy_path = excluded.hierarchy_path, \
         is_default_assignment_team = excluded.is_default_assignment_team, \
         auto_assign = excluded.auto_assign, assignment_method = excluded.assignment_method, \
         active = excluded.active"
    );
    conn.execute(
        &sql,
        params![
            team.id.to_string(),
            team.name,
            opt_id(team.company_id),
            opt_id(team.department_manager_id),
            opt_id(team.parent_id),
            team.hierarchy_path,
            team.is_default_assignment_team,
            team.auto_assign,
            team.assignment_method.code(),
            team.active,
        ],
    )?;

    if let Some(current) = existing.filter(|current| current.hierarchy_path != team.hierarchy_path) {
        let mut stmt = conn.prepare("UPDATE teams SET hierarchy_path = ?2 WHERE id = ?1")?;
        for (id, path) in descendants {
            stmt.execute(params![id, rebase(&path, &current.hierarchy_path, &team.hierarchy_path)])?;
        }
    }
    Ok(team)
}

/// Ids and paths of the strict descendants of the team at `path`.
fn subtree_paths(conn: &Connection, path: &str) -> InfraResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, hierarchy_path FROM teams \
         WHERE substr(hierarchy_path, 1, length(?1)) = ?1 AND hierarchy_path != ?1",
    )?;
    let rows = stmt.query_map(params![path], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn upsert_member(conn: &Connection, member: &TeamMember) -> InfraResult<()> {
    let sql = format!(
        "INSERT INTO team_members ({MEMBER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT(team_id, user_id) DO UPDATE SET role = excluded.role, \
         skill_level = excluded.skill_level, skill_category_ids = excluded.skill_category_ids, \
         coverage_campus_ids = excluded.coverage_campus_ids, \
         availability = excluded.availability, last_assigned_at = excluded.last_assigned_at"
    );
    conn.execute(
        &sql,
        params![
            member.team_id.to_string(),
            member.user_id.to_string(),
            member.role.code(),
            member.skill_level.code(),
            serde_json::to_string(&member.skill_category_ids)?,
            serde_json::to_string(&member.coverage_campus_ids)?,
            member.availability.code(),
            opt_ts(member.last_assigned_at),
        ],
    )?;
    Ok(())
}

fn load_team(conn: &Connection, team_id: TeamId) -> InfraResult<Option<Team>> {
    let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1");
    Ok(conn.query_row(&sql, params![team_id.to_string()], map_team_row).optional()?)
}

fn map_team_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        company_id: opt_uuid_at(row, 2)?,
        department_manager_id: opt_uuid_at(row, 3)?,
        parent_id: opt_uuid_at(row, 4)?,
        hierarchy_path: row.get(5)?,
        is_default_assignment_team: row.get(6)?,
        auto_assign: row.get(7)?,
        assignment_method: code_at(row, 8)?,
        active: row.get(9)?,
    })
}

fn map_member_row(row: &Row<'_>) -> rusqlite::Result<TeamMember> {
    Ok(TeamMember {
        team_id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        role: code_at(row, 2)?,
        skill_level: code_at(row, 3)?,
        skill_category_ids: json_at(row, 4)?,
        coverage_campus_ids: json_at(row, 5)?,
        availability: code_at(row, 6)?,
        last_assigned_at: opt_ts_at(row, 7)?,
    })
}
