//! SQLite implementation of the `SlaPolicyRepository` port.
//!
//! Lines, escalation rules and applicability are stored with the policy as
//! one JSON document; `name` and `active` are projected for listing.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use servicedesk_core::SlaPolicyRepository;
use servicedesk_domain::{Result as DomainResult, ServiceDeskError, SlaPolicy, SlaPolicyId};
use tokio::task;
use tracing::info;

use super::manager::DbManager;
use super::sql::json_at;
use crate::errors::conversions::to_domain;

pub struct SqliteSlaPolicyRepository {
    db: Arc<DbManager>,
}

impl SqliteSlaPolicyRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SlaPolicyRepository for SqliteSlaPolicyRepository {
    async fn get(&self, id: SlaPolicyId) -> DomainResult<Option<SlaPolicy>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Option<SlaPolicy>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT policy_json FROM sla_policies WHERE id = ?1",
                params![id.to_string()],
                |row| json_at(row, 0),
            )
            .optional()
            .map_err(to_domain)
        })
        .await
        .map_err(to_domain)?
    }

    async fn list_active(&self) -> DomainResult<Vec<SlaPolicy>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<Vec<SlaPolicy>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare("SELECT policy_json FROM sla_policies WHERE active = 1 ORDER BY name, id")
                .map_err(to_domain)?;
            let rows = stmt.query_map([], |row| json_at(row, 0)).map_err(to_domain)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_domain)
        })
        .await
        .map_err(to_domain)?
    }

    async fn save(&self, policy: &SlaPolicy) -> DomainResult<()> {
        policy.validate()?;
        let body = serde_json::to_string(policy).map_err(to_domain)?;
        let (id, name, active) = (policy.id, policy.name.clone(), policy.active);
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO sla_policies (id, name, active, policy_json) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, active = excluded.active, \
                 policy_json = excluded.policy_json",
                params![id.to_string(), name, active, body],
            )
            .map_err(to_domain)?;
            Ok(())
        })
        .await
        .map_err(to_domain)??;

        info!(policy_id = %policy.id, name = %policy.name, active = policy.active, "SLA policy saved");
        Ok(())
    }
}

/// Reject a policy id that does not resolve, for callers that require one.
pub async fn require_policy(
    repo: &dyn SlaPolicyRepository,
    id: SlaPolicyId,
) -> DomainResult<SlaPolicy> {
    repo.get(id).await?.ok_or_else(|| ServiceDeskError::NotFound(format!("SLA policy {id}")))
}
