//! Team routing and technician auto-assignment

pub mod hierarchy;
pub mod ports;
pub mod resolver;
pub mod strategy;

pub use resolver::TeamAssignmentResolver;
pub use strategy::{pick_technician, Candidate};
