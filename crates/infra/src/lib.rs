//! # ServiceDesk Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories for requests, teams, SLA policies and identities
//! - Configuration loading from environment and files
//! - Notifier adapters (structured log, JSON webhook)
//! - The cron-driven escalation scheduler
//!
//! ## Architecture
//! - Implements traits defined in `servicedesk-core`
//! - Contains all "impure" code (I/O, HTTP, scheduling)

pub mod config;
pub mod database;
pub mod errors;
pub mod notify;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use notify::{notifier_from_config, LogNotifier, WebhookNotifier};
pub use scheduling::{EscalationScheduler, EscalationSchedulerConfig, SchedulerError};
