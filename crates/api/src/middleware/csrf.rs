//! CSRF check for state-changing account operations.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use bazaar_core::error::SessionError;
use bazaar_core::session::Session;

use super::auth_gate::CurrentSession;
use crate::error::AppError;
use crate::session::cookie::CSRF_HEADER;
use crate::state::AppState;

/// The current session, after the `X-CSRF-Token` header was verified
/// against it.
///
/// Rejects with 403 `InvalidToken` when the header is missing, malformed,
/// expired, or was issued for a different session.
#[derive(Debug, Clone)]
pub struct RequireCsrf(pub Session);

impl FromRequestParts<AppState> for RequireCsrf {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;

        let token = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SessionError::InvalidToken("missing CSRF header".into()))?;

        if !state.csrf.check(&session.id, token)? {
            return Err(SessionError::InvalidToken("CSRF token expired or mismatched".into()).into());
        }

        Ok(RequireCsrf(session))
    }
}
