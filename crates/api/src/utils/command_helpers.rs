//! Command execution helpers
//!
//! Every command body runs through [`execute_command`] so timing and outcome
//! logging look the same for all of them.

use std::future::Future;
use std::time::Instant;

use servicedesk_domain::Result as DomainResult;

use crate::utils::logging::log_command_execution;

/// Execute a command body, logging its duration and outcome.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn get_request(ctx: &AppContext, id: RequestId) -> Result<ServiceRequest> {
///     execute_command("requests::get_request", || async {
///         ctx.lifecycle.request(id).await
///     })
///     .await
/// }
/// ```
pub async fn execute_command<F, Fut, T>(command_name: &str, command_fn: F) -> DomainResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let start = Instant::now();

    let result = command_fn().await;

    log_command_execution(command_name, start.elapsed(), result.as_ref().err());
    result
}

/// Same as [`execute_command`] with the error rendered to a string, for
/// callers at a process or wire boundary.
pub async fn execute_with_string_error<F, Fut, T>(
    command_name: &str,
    command_fn: F,
) -> Result<T, String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    execute_command(command_name, command_fn).await.map_err(|e| e.to_string())
}
