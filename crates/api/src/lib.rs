//! # ServiceDesk App
//!
//! Application layer - commands, dependency wiring and process entry point.
//!
//! This crate contains:
//! - Commands over the lifecycle service and the repositories
//! - Application context (dependency injection)
//! - Logging setup and the `servicedesk` binary
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
