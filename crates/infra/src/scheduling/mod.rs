//! Scheduling infrastructure for automated task execution
//!
//! The escalation scheduler drives the core escalation sweep on a cron
//! schedule:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on all async operations

pub mod error;
pub mod escalation_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use escalation_scheduler::{EscalationScheduler, EscalationSchedulerConfig, SweepJob};
