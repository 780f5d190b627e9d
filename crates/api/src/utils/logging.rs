use std::time::Duration;

use servicedesk_domain::{LoggingConfig, ServiceDeskError};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.level` is the filter. Output
/// is JSON lines when `config.json` is true, human readable otherwise.
///
/// # Errors
/// Returns `ServiceDeskError::Config` when the filter does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ServiceDeskError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ServiceDeskError::Config(format!("Invalid log level '{}': {e}", config.level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| ServiceDeskError::Config(format!("Failed to install subscriber: {e}")))
}

/// Log the outcome of a command execution with structured fields.
///
/// # Parameters
/// * `command` - Logical command identifier (e.g. `"requests::perform_action"`).
/// * `elapsed` - Duration the command execution took.
/// * `error` - The failure, when the command did not succeed.
///
/// Callers must avoid forwarding sensitive values in `command`.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, error: Option<&ServiceDeskError>) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match error {
        None => info!(command, duration_ms, outcome = "success", "command_execution"),
        Some(err) => warn!(
            command,
            duration_ms,
            outcome = "failure",
            error_label = err.label(),
            error = %err,
            "command_execution"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_a_config_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig { level: "servicedesk=loud".into(), json: false };
        let err = init_tracing(&config).unwrap_err();
        assert!(matches!(err, ServiceDeskError::Config(_)));
    }
}
