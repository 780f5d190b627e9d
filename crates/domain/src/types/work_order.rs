//! Work orders owned by a service request

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{RequestId, UserId, WorkOrderId};
use crate::impl_domain_code_conversions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    InProgress,
    Paused,
    Completed,
    Cancelled,
}

impl_domain_code_conversions!(WorkStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Paused => "paused",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl WorkStatus {
    /// Still open; cancelled when a cancellation is approved.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::Paused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    pub done: bool,
}

/// One working interval. `ended_at` is `None` while the work order runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLog {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TimeLog {
    pub fn duration(&self) -> Duration {
        self.ended_at.map_or_else(Duration::zero, |end| end - self.started_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub request_id: RequestId,
    pub name: String,
    pub description: String,
    pub status: WorkStatus,
    pub technician_id: Option<UserId>,
    pub checklist: Vec<ChecklistItem>,
    pub time_logs: Vec<TimeLog>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkOrder {
    pub fn new(
        id: WorkOrderId,
        request_id: RequestId,
        draft: WorkOrderDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            request_id,
            name: draft.name,
            description: draft.description,
            status: WorkStatus::Pending,
            technician_id: draft.technician_id,
            checklist: draft
                .checklist
                .into_iter()
                .map(|label| ChecklistItem { label, done: false })
                .collect(),
            time_logs: Vec::new(),
            created_at,
            completed_at: None,
        }
    }

    /// Sum of closed time logs.
    pub fn actual_duration(&self) -> Duration {
        self.time_logs.iter().fold(Duration::zero(), |acc, log| acc + log.duration())
    }

    /// Done items as a percentage, 0 for an empty checklist.
    #[allow(clippy::cast_precision_loss)]
    pub fn checklist_progress(&self) -> f64 {
        if self.checklist.is_empty() {
            return 0.0;
        }
        let done = self.checklist.iter().filter(|item| item.done).count();
        done as f64 / self.checklist.len() as f64 * 100.0
    }

    pub fn open_log(&mut self, at: DateTime<Utc>) {
        self.time_logs.push(TimeLog { started_at: at, ended_at: None });
    }

    pub fn close_open_log(&mut self, at: DateTime<Utc>) {
        if let Some(log) = self.time_logs.iter_mut().rev().find(|log| log.ended_at.is_none()) {
            log.ended_at = Some(at);
        }
    }
}

/// Input for `CreateWorkOrder`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkOrderDraft {
    pub name: String,
    pub description: String,
    pub technician_id: Option<UserId>,
    pub checklist: Vec<String>,
}
