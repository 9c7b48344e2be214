use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bazaar_core::error::{CoreError, SessionError};
use serde_json::json;

/// Application-level error type for HTTP handlers and middleware.
///
/// Wraps [`CoreError`] for domain errors and [`SessionError`] for the
/// session layer, plus raw sqlx failures. Implements
/// [`IntoResponse`] to produce the JSON error envelope:
///
/// ```json
/// { "statusCode": 403, "body": { "errorMessage": "...", "errorType": "NoAuth" } }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bazaar_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A session, token, or CSRF failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NotFound",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "Validation", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "Unauthorized", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            // --- Session layer ---
            AppError::Session(session) => classify_session_error(session),

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),
        };

        let body = json!({
            "statusCode": status.as_u16(),
            "body": {
                "errorMessage": message,
                "errorType": error_type,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a session error into an HTTP status, error type, and message.
///
/// Every "not authenticated" flavour collapses into the same 403 so clients
/// cannot tell an expired session from a forged one.
fn classify_session_error(err: &SessionError) -> (StatusCode, &'static str, String) {
    match err {
        SessionError::NoAuth => (
            StatusCode::FORBIDDEN,
            "NoAuth",
            "Authentication required".to_string(),
        ),
        SessionError::InvalidToken(reason) => {
            tracing::debug!(reason = %reason, "Rejected token");
            (
                StatusCode::FORBIDDEN,
                "InvalidToken",
                "Invalid or expired token".to_string(),
            )
        }
        SessionError::StoreUnavailable { .. } | SessionError::Signing(_) => {
            tracing::error!(error = %err, "Session layer failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StoreUnavailable",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error type, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NotFound",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "Conflict",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StoreUnavailable",
                INTERNAL_MESSAGE.to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StoreUnavailable",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}
