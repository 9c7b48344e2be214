use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the session layer (session managers, CSRF tokens).
///
/// The `Display` output never contains a raw session id, token, or key.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session, or the session is malformed, unknown, or expired.
    ///
    /// The reason is deliberately not carried: every flavour of "not
    /// authenticated" looks the same to the client.
    #[error("No valid session")]
    NoAuth,

    /// The backing store (database, network) failed.
    #[error("Session store unavailable during {op}: {message}")]
    StoreUnavailable { op: &'static str, message: String },

    /// A signed value (session token, CSRF token) failed verification.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Minting a signed value failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl SessionError {
    /// Wrap a store failure with the name of the operation that hit it.
    pub fn store(op: &'static str, err: impl std::fmt::Display) -> Self {
        SessionError::StoreUnavailable {
            op,
            message: err.to_string(),
        }
    }
}
