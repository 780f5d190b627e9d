//! History ledger
//!
//! Entries are immutable once written. Everything the ledger adds on top of
//! them (stage durations, descriptions) is a read-time projection.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use servicedesk_domain::{HistoryDraft, HistoryEntry, Locale, RequestId, Result};
use uuid::Uuid;

use super::describe::describe;
use crate::time::Clock;
use crate::workflow::catalog::StageCatalog;
use crate::workflow::ports::RequestStore;

/// An entry with its derived projections.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub entry: HistoryEntry,
    /// Hours spent in the stage this entry leaves; only for stage moves.
    pub stage_duration_hours: Option<f64>,
    pub description: String,
}

pub struct HistoryLedger {
    store: Arc<dyn RequestStore>,
    clock: Arc<dyn Clock>,
    catalog: StageCatalog,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn RequestStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, catalog: StageCatalog::new() }
    }

    /// Assign id and timestamp so the entry can join a request commit.
    pub fn stamp(&self, draft: HistoryDraft, at: DateTime<Utc>) -> HistoryEntry {
        draft.into_entry(Uuid::now_v7(), at)
    }

    pub fn stamp_all(&self, drafts: Vec<HistoryDraft>, at: DateTime<Utc>) -> Vec<HistoryEntry> {
        drafts.into_iter().map(|draft| self.stamp(draft, at)).collect()
    }

    /// Write a standalone entry.
    ///
    /// # Errors
    /// Storage failures propagate as `ServiceDeskError::Persistence`.
    pub async fn append(&self, draft: HistoryDraft) -> Result<HistoryEntry> {
        let entry = self.stamp(draft, self.clock.now());
        self.store.append_history(&entry).await?;
        tracing::debug!(
            request_id = %entry.request_id,
            event_type = %entry.event_type,
            "history entry appended"
        );
        Ok(entry)
    }

    /// Full history of a request with durations and localized descriptions.
    pub async fn timeline(&self, request_id: RequestId, locale: Locale) -> Result<Vec<TimelineEntry>> {
        let entries = self.store.history(request_id).await?;
        Ok(project(&entries, locale, &self.catalog))
    }
}

/// Derive durations and descriptions for entries in append order.
pub fn project(entries: &[HistoryEntry], locale: Locale, catalog: &StageCatalog) -> Vec<TimelineEntry> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let stage_duration_hours = entry
                .stage_move()
                .map(|_| fractional_hours(stage_change_duration(entries, index)));
            TimelineEntry {
                entry: entry.clone(),
                stage_duration_hours,
                description: describe(entry, stage_duration_hours, locale, catalog),
            }
        })
        .collect()
}

// Stage durations are far below 2^53 seconds, so the float is exact.
#[allow(clippy::cast_precision_loss)]
fn fractional_hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

/// Time spent in the stage that `entries[index]` leaves.
///
/// Looks for the most recent earlier stage move whose new stage equals this
/// entry's old stage. Zero when there is none or the entry is not a stage
/// move.
pub fn stage_change_duration(entries: &[HistoryEntry], index: usize) -> Duration {
    let Some(entry) = entries.get(index) else {
        return Duration::zero();
    };
    let Some((old_stage, _)) = entry.stage_move() else {
        return Duration::zero();
    };

    entries[..index]
        .iter()
        .rev()
        .find(|prior| prior.stage_move().is_some_and(|(_, new)| new == old_stage))
        .map_or_else(Duration::zero, |prior| entry.timestamp - prior.timestamp)
}
