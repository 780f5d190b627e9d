//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use servicedesk_domain::ServiceDeskError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ServiceDeskError);

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InfraError {}

impl From<InfraError> for ServiceDeskError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ServiceDeskError> for InfraError {
    fn from(value: ServiceDeskError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoServiceDeskError {
    fn into_servicedesk(self) -> ServiceDeskError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ServiceDeskError */
/* -------------------------------------------------------------------------- */

impl IntoServiceDeskError for SqlError {
    fn into_servicedesk(self) -> ServiceDeskError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        ServiceDeskError::Persistence("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        ServiceDeskError::Persistence("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        ServiceDeskError::InvalidInput(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        ServiceDeskError::InvalidInput("foreign key constraint violation".into())
                    }
                    _ => ServiceDeskError::Persistence(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                ServiceDeskError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                ServiceDeskError::Persistence(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ServiceDeskError::Persistence(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                ServiceDeskError::Persistence("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => ServiceDeskError::Persistence(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => ServiceDeskError::Persistence(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_servicedesk())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → ServiceDeskError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(ServiceDeskError::Persistence(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → ServiceDeskError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(ServiceDeskError::Persistence(format!("invalid stored JSON: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → ServiceDeskError */
/* -------------------------------------------------------------------------- */

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        InfraError(ServiceDeskError::Internal(format!("blocking task failed: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ServiceDeskError */
/* -------------------------------------------------------------------------- */

impl IntoServiceDeskError for HttpError {
    fn into_servicedesk(self) -> ServiceDeskError {
        if self.is_timeout() {
            return ServiceDeskError::Notification("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ServiceDeskError::Notification("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                400..=499 if code != 429 => ServiceDeskError::Config(format!(
                    "notification endpoint rejected the request: {message}"
                )),
                _ => ServiceDeskError::Notification(message),
            };
        }

        ServiceDeskError::Notification(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_servicedesk())
    }
}

/// Shorthand for `map_err` call sites in blocking database closures.
pub(crate) fn to_domain<E>(err: E) -> ServiceDeskError
where
    InfraError: From<E>,
{
    InfraError::from(err).into()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;
    use tokio::runtime::Runtime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_persistence_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: ServiceDeskError = InfraError::from(err).into();
        match mapped {
            ServiceDeskError::Persistence(msg) => assert!(msg.contains("busy")),
            other => panic!("expected persistence error, got {:?}", other),
        }
        assert!(ServiceDeskError::Persistence(String::new()).is_retryable());
    }

    #[test]
    fn unique_violation_maps_to_invalid_input() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some("UNIQUE constraint failed: teams.name".into()),
        );

        let mapped: ServiceDeskError = InfraError::from(err).into();
        assert!(matches!(mapped, ServiceDeskError::InvalidInput(msg) if msg.contains("teams.name")));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped = to_domain(SqlError::QueryReturnedNoRows);
        assert!(matches!(mapped, ServiceDeskError::NotFound(_)));
    }

    #[test]
    fn http_server_error_maps_to_notification_error() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.post(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: ServiceDeskError = InfraError::from(error).into();
            match mapped {
                ServiceDeskError::Notification(msg) => assert!(msg.contains("503")),
                other => panic!("expected notification error, got {:?}", other),
            }
        });
    }
}
