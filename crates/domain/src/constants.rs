//! Application constants
//!
//! Centralized location for domain-level constants.

/// Window before the resolution deadline in which a request counts as at risk.
pub const DEFAULT_AT_RISK_WINDOW_MINUTES: i64 = 60;

/// Upper bound for any SLA line target (100 years), so deadlines stay
/// representable.
pub const MAX_SLA_TARGET_HOURS: f64 = 876_000.0;

/// Maximum depth of the team hierarchy (root is depth 1).
pub const MAX_TEAM_HIERARCHY_DEPTH: usize = 10;

/// Prefix for human-readable request numbers.
pub const REQUEST_NUMBER_PREFIX: &str = "REQ-";

// Escalation sweep defaults
pub const DEFAULT_ESCALATION_CRON: &str = "0 */5 * * * *";
pub const DEFAULT_ESCALATION_JOB_TIMEOUT_SECS: u64 = 120;

// Notification dispatch defaults
pub const DEFAULT_NOTIFICATION_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_NOTIFICATION_BACKOFF_MS: u64 = 500;

// Database defaults
pub const DEFAULT_DB_PATH: &str = "servicedesk.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 8;

/// Automatic comment added once every work order of a request is completed.
pub const READY_FOR_APPROVAL_NOTE: &str =
    "All work orders completed. Request is ready to be sent for approval.";
