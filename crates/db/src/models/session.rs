//! User session model and DTOs.

use bazaar_core::session::Session;
use bazaar_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A session row from the `user_sessions` table.
///
/// Only the SHA-256 digest of the session id is stored; the id itself
/// lives in the client's cookie.
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: DbId,
    pub session_hash: String,
    pub user_id: DbId,
    pub remote_ip: String,
    pub browser: String,
    pub operating_system: String,
    pub city: String,
    pub location: String,
    pub created_at: Timestamp,
    pub first_login: Timestamp,
    pub last_login: Timestamp,
    pub expires_at: Timestamp,
}

impl UserSession {
    /// Rebuild the domain session, given the plaintext id the row was found by.
    pub fn into_session(self, session_id: String) -> Session {
        Session {
            id: session_id,
            user_id: self.user_id,
            remote_ip: self.remote_ip,
            browser: self.browser,
            operating_system: self.operating_system,
            city: self.city,
            location: self.location,
            created_at: self.created_at,
            first_login: self.first_login,
            last_login: self.last_login,
        }
    }
}

/// DTO for creating a new user session.
pub struct CreateSession {
    pub session_hash: String,
    pub user_id: DbId,
    pub remote_ip: String,
    pub browser: String,
    pub operating_system: String,
    pub city: String,
    pub location: String,
    pub created_at: Timestamp,
    pub first_login: Timestamp,
    pub last_login: Timestamp,
    pub expires_at: Timestamp,
}
