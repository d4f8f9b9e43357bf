//! Error handling for CamHub
//!
//! One error enum shared by the API server and the workers. API handlers
//! convert it to an HTTP response; workers record outcomes in the store
//! and never surface errors to HTTP clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-caused validation failure (field + reason)
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Referenced entity absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic/state collision (terminal transition, path mismatch, key reuse)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Schema-level constraint violated
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Transient infrastructure failure; callers may retry
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// HTTP client error (AI model host)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation error naming the offending field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for failures worth retrying after a backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Database(_) | Error::Http(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            // Pool exhaustion and lost connections are retriable, not internal.
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Error::Unavailable(e.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict(db.to_string())
            }
            sqlx::Error::Database(db)
                if db.is_foreign_key_violation() || db.is_check_violation() =>
            {
                Error::ConstraintViolation(db.to_string())
            }
            _ => Error::Database(e),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message, field) = match &self {
            Error::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
                Some(field.clone()),
            ),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            Error::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            Error::ConstraintViolation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONSTRAINT_VIOLATION",
                msg.clone(),
                None,
            ),
            Error::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                msg.clone(),
                None,
            ),
            // Internal details stay out of the response body; the correlation
            // id ties the response to the server log line.
            Error::Database(_)
            | Error::Http(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Internal(_) => {
                let correlation_id = uuid::Uuid::new_v4();
                tracing::error!(
                    correlation_id = %correlation_id,
                    error = %self,
                    "Internal error"
                );
                let body = Json(json!({
                    "error_code": "INTERNAL_ERROR",
                    "message": format!("Internal error (correlation id {})", correlation_id),
                    "field": serde_json::Value::Null,
                }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };

        tracing::warn!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message,
            "field": field,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_shorthand() {
        let err = Error::validation("motion_score", "must be non-negative");
        match err {
            Error::Validation { field, message } => {
                assert_eq!(field, "motion_score");
                assert_eq!(message, "must be non-negative");
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_retriable_classification() {
        assert!(Error::Unavailable("pool exhausted".into()).is_retriable());
        assert!(!Error::NotFound("event 1".into()).is_retriable());
        assert!(!Error::Conflict("already terminal".into()).is_retriable());
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
