//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `SERVICEDESK_DB_PATH` is set, configuration comes from the
//!    environment; unset variables keep their defaults
//! 2. Otherwise the first config file found by [`find_config_path`] is
//!    parsed (JSON or TOML by extension)
//! 3. With no environment and no file, defaults are used
//!
//! ## Environment Variables
//! - `SERVICEDESK_DB_PATH`: Database file path
//! - `SERVICEDESK_DB_POOL_SIZE`: Connection pool size
//! - `SERVICEDESK_ESCALATION_ENABLED`: Run the escalation sweep (true/false)
//! - `SERVICEDESK_ESCALATION_CRON`: Six-field cron expression for the sweep
//! - `SERVICEDESK_ESCALATION_JOB_TIMEOUT_SECS`: Per-sweep timeout
//! - `SERVICEDESK_WEBHOOK_URL`: Notification webhook endpoint
//! - `SERVICEDESK_NOTIFY_MAX_ATTEMPTS`: Delivery attempts per notification
//! - `SERVICEDESK_NOTIFY_BACKOFF_MS`: Linear retry backoff step
//! - `SERVICEDESK_NOTIFY_BACKGROUND`: Deliver on a spawned task (true/false)
//! - `SERVICEDESK_SLA_AT_RISK_MINUTES`: At-risk window before the deadline
//! - `SERVICEDESK_LOG_LEVEL`: Default log filter when `RUST_LOG` is unset
//! - `SERVICEDESK_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. The file named by `SERVICEDESK_CONFIG`
//! 2. `./servicedesk.toml`, `./servicedesk.json`, `./config/servicedesk.toml`
//! 3. `servicedesk.toml` / `servicedesk.json` next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use servicedesk_domain::{Config, Result, ServiceDeskError};

pub const ENV_CONFIG_PATH: &str = "SERVICEDESK_CONFIG";
const ENV_DB_PATH: &str = "SERVICEDESK_DB_PATH";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ServiceDeskError::Config` if the selected source is invalid.
/// A missing source is not an error; defaults are returned instead.
pub fn load() -> Result<Config> {
    if std::env::var_os(ENV_DB_PATH).is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match find_config_path() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No configuration source found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration from environment variables
///
/// `SERVICEDESK_DB_PATH` is required; every other variable is optional.
///
/// # Errors
/// Returns `ServiceDeskError::Config` if the database path is missing or a
/// numeric variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var(ENV_DB_PATH)?;
    if let Some(pool_size) = env_parse("SERVICEDESK_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }

    config.escalation.enabled = env_bool("SERVICEDESK_ESCALATION_ENABLED", config.escalation.enabled);
    if let Ok(cron) = std::env::var("SERVICEDESK_ESCALATION_CRON") {
        config.escalation.cron_expression = cron;
    }
    if let Some(timeout) = env_parse("SERVICEDESK_ESCALATION_JOB_TIMEOUT_SECS")? {
        config.escalation.job_timeout_secs = timeout;
    }

    config.notifications.webhook_url =
        std::env::var("SERVICEDESK_WEBHOOK_URL").ok().filter(|url| !url.trim().is_empty());
    if let Some(attempts) = env_parse("SERVICEDESK_NOTIFY_MAX_ATTEMPTS")? {
        config.notifications.max_attempts = attempts;
    }
    if let Some(backoff) = env_parse("SERVICEDESK_NOTIFY_BACKOFF_MS")? {
        config.notifications.retry_backoff_ms = backoff;
    }
    config.notifications.background =
        env_bool("SERVICEDESK_NOTIFY_BACKGROUND", config.notifications.background);

    if let Some(window) = env_parse("SERVICEDESK_SLA_AT_RISK_MINUTES")? {
        config.sla.at_risk_window_minutes = window;
    }

    if let Ok(level) = std::env::var("SERVICEDESK_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("SERVICEDESK_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations.
///
/// # Errors
/// Returns `ServiceDeskError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ServiceDeskError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            ServiceDeskError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ServiceDeskError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content; format follows the extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ServiceDeskError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ServiceDeskError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(ServiceDeskError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Search the standard locations and return the first existing file.
pub fn find_config_path() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(explicit) = std::env::var_os(ENV_CONFIG_PATH) {
        candidates.push(PathBuf::from(explicit));
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend([
            cwd.join("servicedesk.toml"),
            cwd.join("servicedesk.json"),
            cwd.join("config").join("servicedesk.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend([exe_dir.join("servicedesk.toml"), exe_dir.join("servicedesk.json")]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        ServiceDeskError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ServiceDeskError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
