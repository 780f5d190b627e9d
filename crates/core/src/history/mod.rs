//! Append-only audit ledger

pub mod describe;
pub mod ledger;

pub use describe::describe;
pub use ledger::{project, stage_change_duration, HistoryLedger, TimelineEntry};
