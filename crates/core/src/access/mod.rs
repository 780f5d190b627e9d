//! Role-based permission gate

pub mod evaluator;
pub mod ports;

pub use evaluator::{Permission, PermissionEvaluator, PermissionSet};
