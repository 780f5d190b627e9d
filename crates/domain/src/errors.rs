//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ServiceDesk
///
/// The first five variants form the lifecycle taxonomy surfaced by every
/// request action. The remaining ones cover lookups, input validation and
/// infrastructure plumbing.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ServiceDeskError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Non-fatal. Actions log it as a warning and continue with null deadlines.
    #[error("Missing SLA policy: {0}")]
    MissingSlaPolicy(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceDeskError {
    /// Whether the caller may refresh and retry the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::ConcurrentModification(_))
    }

    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::MissingSlaPolicy(_) => "missing_sla_policy",
            Self::Persistence(_) => "persistence",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config",
            Self::Notification(_) => "notification",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for ServiceDesk operations
pub type Result<T> = std::result::Result<T, ServiceDeskError>;
