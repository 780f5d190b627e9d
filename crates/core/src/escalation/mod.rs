//! SLA escalation sweep

pub mod sweeper;

pub use sweeper::{EscalationSweeper, SweepReport};
