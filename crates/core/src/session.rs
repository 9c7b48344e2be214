//! The authenticated browser/device binding and its identifier.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hashing::sha256_hex;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a generated session identifier (alphanumeric characters).
///
/// 43 characters over a 62-symbol alphabet carry roughly 256 bits.
pub const SESSION_ID_LENGTH: usize = 43;

/// Lifetime of a session and of its cookie, in days.
pub const SESSION_LIFETIME_DAYS: i64 = 90;

/// Placeholder used when user-agent or geo data cannot be determined.
pub const UNKNOWN: &str = "Unknown";

/// Number of hash characters shown when a session has to be logged.
const LOG_ID_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One authenticated browser/device binding.
///
/// A session always belongs to exactly one user. It is either fully
/// present or absent: a row or token that cannot be decoded into this
/// struct is treated as "no session".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, unguessable identifier carried by the cookie.
    pub id: String,
    pub user_id: DbId,
    pub remote_ip: String,
    pub browser: String,
    pub operating_system: String,
    pub city: String,
    /// Free-text `"lat,lon"` string.
    pub location: String,
    pub created_at: Timestamp,
    pub first_login: Timestamp,
    pub last_login: Timestamp,
}

impl Session {
    /// Short, non-reversible handle for log lines.
    pub fn log_id(&self) -> String {
        session_log_id(&self.id)
    }
}

/// Generate a new random session identifier.
pub fn generate_session_id() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Digest under which a session id is persisted.
pub fn hash_session_id(id: &str) -> String {
    sha256_hex(id.as_bytes())
}

/// Loggable prefix of the session id digest.
pub fn session_log_id(id: &str) -> String {
    let mut hash = hash_session_id(id);
    hash.truncate(LOG_ID_LENGTH);
    hash
}

/// Whether `id` has the shape of a generated session identifier.
///
/// Lets callers reject garbage cookies before touching the store.
pub fn is_well_formed_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}
