//! Request lifecycle workflow
//!
//! The catalog owns the stage graph, the engine applies actions to a working
//! copy, and the service loads, commits and notifies around the engine.

pub mod catalog;
pub mod engine;
pub mod ports;
pub mod service;

pub use catalog::{StageCatalog, StageInfo};
pub use engine::{
    request_number, ActionContext, Audience, PendingNotification, Prefetched, RequestAction,
    StageTransitionEngine, UnitOfWork,
};
pub use service::{ActionOutcome, LifecycleService};
