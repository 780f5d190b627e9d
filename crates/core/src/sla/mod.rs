//! SLA deadlines, breach status and policy applicability

pub mod calculator;
pub mod ports;
pub mod priority;

pub use calculator::{SlaCalculator, SlaSnapshot};
pub use priority::priority_for;
