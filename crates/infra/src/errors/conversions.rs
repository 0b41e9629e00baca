//! Error newtype that keeps external-crate conversions on the
//! infrastructure side and converts back into the domain error.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use shotflow_common::storage::StorageError;
use shotflow_domain::ShotFlowError;

/// Infrastructure error wrapper around the domain error.
#[derive(Debug)]
pub struct InfraError(pub ShotFlowError);

impl From<InfraError> for ShotFlowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ShotFlowError> for InfraError {
    fn from(value: ShotFlowError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(err: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let domain = match err {
            RE::SqliteFailure(inner, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (inner.code, inner.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        ShotFlowError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        ShotFlowError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        ShotFlowError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        ShotFlowError::Database("foreign key constraint violation".into())
                    }
                    _ => ShotFlowError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        inner.code, inner.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                ShotFlowError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                ShotFlowError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ShotFlowError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => ShotFlowError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidQuery => ShotFlowError::Database("invalid SQL query".into()),
            other => ShotFlowError::Database(other.to_string()),
        };
        InfraError(domain)
    }
}

impl From<StorageError> for InfraError {
    fn from(err: StorageError) -> Self {
        let domain = match err {
            StorageError::Connection(msg) => ShotFlowError::Database(format!("pool error: {msg}")),
            StorageError::Query(msg) => ShotFlowError::Database(msg),
            StorageError::Rusqlite(inner) => return InfraError::from(inner),
        };
        InfraError(domain)
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let domain = if err.is_timeout() {
            ShotFlowError::Network(format!("request timed out: {err}"))
        } else if err.is_connect() {
            ShotFlowError::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            ShotFlowError::Internal(format!("failed to decode response body: {err}"))
        } else {
            ShotFlowError::Network(err.to_string())
        };
        InfraError(domain)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        InfraError(ShotFlowError::Internal(format!("json serialization failed: {err}")))
    }
}
