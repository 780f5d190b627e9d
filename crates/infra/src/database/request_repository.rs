//! SQLite implementation of the `RequestStore` port.
//!
//! A request row carries the indexed projection columns (stage, owner,
//! technician, deadlines) next to the full JSON body. Work orders and history
//! live in their own tables and are written in the same transaction as the
//! request they belong to.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use servicedesk_core::{RequestCommit, RequestStore};
use servicedesk_domain::{
    HistoryEntry, RequestId, Result as DomainResult, ServiceDeskError, ServiceRequest, Stage,
    UserId, WorkOrder,
};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use super::sql::{
    code_at, int, json_at, opt_code, opt_code_at, opt_id, opt_ts, opt_ts_at, opt_uuid_at, ts,
    ts_at, unsigned, uuid_at,
};
use crate::errors::InfraError;

type InfraResult<T> = std::result::Result<T, InfraError>;

/// Stage codes of done requests, as a SQL list.
const DONE_STAGES_SQL: &str = "('completed', 'rejected', 'cancelled')";

const WORK_ORDER_COLUMNS: &str = "id, request_id, name, description, status, technician_id, \
     checklist_json, time_logs_json, created_at, completed_at";

const HISTORY_COLUMNS: &str = "id, request_id, timestamp, actor_id, event_type, old_stage, \
     new_stage, old_team, new_team, old_technician, new_technician, approval_status, \
     work_order_id, work_order_status, note, is_automatic";

pub struct SqliteRequestStore {
    db: Arc<DbManager>,
}

impl SqliteRequestStore {
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
}

#[async_trait]
impl RequestStore for SqliteRequestStore {
    async fn insert(&self, request: &ServiceRequest) -> DomainResult<()> {
        let request = request.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            insert_request(&tx, &request)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn load(&self, id: RequestId) -> DomainResult<Option<ServiceRequest>> {
        self.run(move |conn| load_request(conn, id)).await
    }

    async fn commit(&self, commit: RequestCommit) -> DomainResult<u64> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let request_id = commit.request.id;

            let stored: Option<i64> = tx
                .query_row(
                    "SELECT version FROM service_requests WHERE id = ?1",
                    params![request_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let stored = stored.ok_or_else(|| {
                ServiceDeskError::NotFound(format!("service request {request_id}"))
            })?;
            if unsigned(stored, 0)? != commit.expected_version {
                return Err(ServiceDeskError::ConcurrentModification(format!(
                    "expected version {}, found {stored}",
                    commit.expected_version
                ))
                .into());
            }

            let version = commit.expected_version + 1;
            update_request(&tx, &commit.request, version)?;
            replace_work_orders(&tx, &commit.request)?;
            if let Some(spawned) = &commit.spawned {
                insert_request(&tx, spawned)?;
            }
            for entry in &commit.history {
                insert_history(&tx, entry)?;
            }
            tx.commit()?;

            debug!(
                request_id = %request_id,
                version,
                history_entries = commit.history.len(),
                "request commit applied"
            );
            Ok(version)
        })
        .await
    }

    async fn history(&self, id: RequestId) -> DomainResult<Vec<HistoryEntry>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {HISTORY_COLUMNS} FROM request_history WHERE request_id = ?1 ORDER BY seq"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![id.to_string()], map_history_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn append_history(&self, entry: &HistoryEntry) -> DomainResult<()> {
        let entry = entry.clone();
        self.run(move |conn| insert_history(conn, &entry)).await
    }

    async fn list_open_with_sla(&self) -> DomainResult<Vec<RequestId>> {
        self.run(|conn| {
            let sql = format!(
                "SELECT id FROM service_requests \
                 WHERE stage NOT IN {DONE_STAGES_SQL} AND sla_policy_id IS NOT NULL \
                 ORDER BY created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| uuid_at(row, 0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn count_active_for_technician(&self, technician_id: UserId) -> DomainResult<usize> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM service_requests \
                 WHERE technician_id = ?1 AND stage NOT IN {DONE_STAGES_SQL}"
            );
            let count: i64 =
                conn.query_row(&sql, params![technician_id.to_string()], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }

    async fn delete(&self, id: RequestId) -> DomainResult<()> {
        self.run(move |conn| {
            let removed =
                conn.execute("DELETE FROM service_requests WHERE id = ?1", params![id.to_string()])?;
            if removed == 0 {
                return Err(ServiceDeskError::NotFound(format!("service request {id}")).into());
            }
            Ok(())
        })
        .await
    }
}

fn request_body(request: &ServiceRequest) -> InfraResult<String> {
    let mut body = request.clone();
    body.work_orders.clear();
    Ok(serde_json::to_string(&body)?)
}

fn insert_request(conn: &Connection, request: &ServiceRequest) -> InfraResult<()> {
    conn.execute(
        "INSERT INTO service_requests (id, number, owner_id, stage, priority, sla_status, \
         assigned_team_id, technician_id, sla_policy_id, resolution_deadline, created_at, \
         closed_at, version, request_json) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            request.id.to_string(),
            request.number,
            request.owner_id.to_string(),
            request.stage.code(),
            request.priority.code(),
            request.sla_status.code(),
            opt_id(request.assigned_team_id),
            opt_id(request.technician_id),
            opt_id(request.sla_policy_id),
            opt_ts(request.resolution_deadline),
            ts(request.created_at),
            opt_ts(request.closed_at),
            int(request.version)?,
            request_body(request)?,
        ],
    )?;
    replace_work_orders(conn, request)
}

fn update_request(conn: &Connection, request: &ServiceRequest, version: u64) -> InfraResult<()> {
    conn.execute(
        "UPDATE service_requests SET stage = ?2, priority = ?3, sla_status = ?4, \
         assigned_team_id = ?5, technician_id = ?6, sla_policy_id = ?7, \
         resolution_deadline = ?8, closed_at = ?9, version = ?10, request_json = ?11 \
         WHERE id = ?1",
        params![
            request.id.to_string(),
            request.stage.code(),
            request.priority.code(),
            request.sla_status.code(),
            opt_id(request.assigned_team_id),
            opt_id(request.technician_id),
            opt_id(request.sla_policy_id),
            opt_ts(request.resolution_deadline),
            opt_ts(request.closed_at),
            int(version)?,
            request_body(request)?,
        ],
    )?;
    Ok(())
}

fn replace_work_orders(conn: &Connection, request: &ServiceRequest) -> InfraResult<()> {
    conn.execute("DELETE FROM work_orders WHERE request_id = ?1", params![request.id.to_string()])?;
    let mut stmt = conn.prepare(
        "INSERT INTO work_orders (id, request_id, position, name, description, status, \
         technician_id, checklist_json, time_logs_json, created_at, completed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for (position, wo) in request.work_orders.iter().enumerate() {
        stmt.execute(params![
            wo.id.to_string(),
            request.id.to_string(),
            int(position)?,
            wo.name,
            wo.description,
            wo.status.code(),
            opt_id(wo.technician_id),
            serde_json::to_string(&wo.checklist)?,
            serde_json::to_string(&wo.time_logs)?,
            ts(wo.created_at),
            opt_ts(wo.completed_at),
        ])?;
    }
    Ok(())
}

fn insert_history(conn: &Connection, entry: &HistoryEntry) -> InfraResult<()> {
    let sql = format!(
        "INSERT INTO request_history ({HISTORY_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    );
    conn.execute(
        &sql,
        params![
            entry.id.to_string(),
            entry.request_id.to_string(),
            ts(entry.timestamp),
            opt_id(entry.actor_id),
            entry.event_type.code(),
            opt_code(entry.old_stage),
            opt_code(entry.new_stage),
            opt_id(entry.old_team),
            opt_id(entry.new_team),
            opt_id(entry.old_technician),
            opt_id(entry.new_technician),
            opt_code(entry.approval_status),
            opt_id(entry.work_order_id),
            opt_code(entry.work_order_status),
            entry.note,
            entry.is_automatic,
        ],
    )?;
    Ok(())
}

fn load_request(conn: &Connection, id: RequestId) -> InfraResult<Option<ServiceRequest>> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT request_json, version FROM service_requests WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((body, version)) = row else {
        return Ok(None);
    };

    let mut request: ServiceRequest = serde_json::from_str(&body)?;
    request.version = unsigned(version, 1)?;
    request.work_orders = load_work_orders(conn, id)?;
    Ok(Some(request))
}

fn load_work_orders(conn: &Connection, request_id: RequestId) -> InfraResult<Vec<WorkOrder>> {
    let sql = format!(
        "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE request_id = ?1 ORDER BY position"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![request_id.to_string()], map_work_order_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn map_work_order_row(row: &Row<'_>) -> rusqlite::Result<WorkOrder> {
    Ok(WorkOrder {
        id: uuid_at(row, 0)?,
        request_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: code_at(row, 4)?,
        technician_id: opt_uuid_at(row, 5)?,
        checklist: json_at(row, 6)?,
        time_logs: json_at(row, 7)?,
        created_at: ts_at(row, 8)?,
        completed_at: opt_ts_at(row, 9)?,
    })
}

fn map_history_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: uuid_at(row, 0)?,
        request_id: uuid_at(row, 1)?,
        timestamp: ts_at(row, 2)?,
        actor_id: opt_uuid_at(row, 3)?,
        event_type: code_at(row, 4)?,
        old_stage: opt_code_at::<Stage>(row, 5)?,
        new_stage: opt_code_at::<Stage>(row, 6)?,
        old_team: opt_uuid_at(row, 7)?,
        new_team: opt_uuid_at(row, 8)?,
        old_technician: opt_uuid_at(row, 9)?,
        new_technician: opt_uuid_at(row, 10)?,
        approval_status: opt_code_at(row, 11)?,
        work_order_id: opt_uuid_at(row, 12)?,
        work_order_status: opt_code_at(row, 13)?,
        note: row.get(14)?,
        is_automatic: row.get(15)?,
    })
}
