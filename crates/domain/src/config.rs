//! Configuration structures
//!
//! Loaded by `servicedesk-infra::config` from the environment or a JSON/TOML
//! file. Every section has defaults so partial files are accepted.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AT_RISK_WINDOW_MINUTES, DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE,
    DEFAULT_ESCALATION_CRON, DEFAULT_ESCALATION_JOB_TIMEOUT_SECS,
    DEFAULT_NOTIFICATION_BACKOFF_MS, DEFAULT_NOTIFICATION_MAX_ATTEMPTS,
};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub escalation: EscalationConfig,
    pub notifications: NotificationConfig,
    pub sla: SlaConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// Escalation sweep schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    pub job_timeout_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: DEFAULT_ESCALATION_CRON.to_string(),
            job_timeout_secs: DEFAULT_ESCALATION_JOB_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// When set, notifications are POSTed here; otherwise they are only logged.
    pub webhook_url: Option<String>,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Deliver on a spawned task instead of awaiting inline.
    pub background: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_attempts: DEFAULT_NOTIFICATION_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_NOTIFICATION_BACKOFF_MS,
            background: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    pub at_risk_window_minutes: i64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self { at_risk_window_minutes: DEFAULT_AT_RISK_WINDOW_MINUTES }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
