//! # ServiceDesk Core
//!
//! Pure business logic for the service request lifecycle. No database, HTTP
//! or scheduler code lives here.
//!
//! This crate contains:
//! - Port interfaces (traits) for identity, teams, SLA policies, requests
//!   and notifications
//! - The stage catalog, permission evaluator, SLA calculator, history
//!   ledger and team assignment resolver
//! - The transition engine and the lifecycle service that runs each action
//!   as one unit of work
//! - The escalation sweeper driven by the infrastructure scheduler
//!
//! ## Architecture Principles
//! - Only depends on `servicedesk-domain`
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod access;
pub mod assignment;
pub mod escalation;
pub mod history;
pub mod notify;
pub mod sla;
pub mod time;
pub mod workflow;

pub use access::ports::IdentityProvider;
pub use access::{PermissionEvaluator, PermissionSet};
pub use assignment::ports::{TeamDirectory, TeamRegistry};
pub use assignment::TeamAssignmentResolver;
pub use escalation::{EscalationSweeper, SweepReport};
pub use history::{HistoryLedger, TimelineEntry};
pub use notify::ports::{Notification, Notifier};
pub use notify::{DeliveryMode, NotificationDispatcher};
pub use sla::ports::SlaPolicyRepository;
pub use sla::{SlaCalculator, SlaSnapshot};
pub use time::{Clock, ManualClock, SystemClock};
pub use workflow::ports::{RequestCommit, RequestStore};
pub use workflow::{
    ActionOutcome, LifecycleService, RequestAction, StageCatalog, StageInfo,
    StageTransitionEngine,
};
