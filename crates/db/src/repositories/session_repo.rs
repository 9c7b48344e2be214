//! Repository for the `user_sessions` table.

use bazaar_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{CreateSession, UserSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_hash, user_id, remote_ip, browser, operating_system, \
                        city, location, created_at, first_login, last_login, expires_at";

/// Provides CRUD operations for user sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions (session_hash, user_id, remote_ip, browser, \
                 operating_system, city, location, created_at, first_login, last_login, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(&input.session_hash)
            .bind(input.user_id)
            .bind(&input.remote_ip)
            .bind(&input.browser)
            .bind(&input.operating_system)
            .bind(&input.city)
            .bind(&input.location)
            .bind(input.created_at)
            .bind(input.first_login)
            .bind(input.last_login)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a live session by the hash of its id.
    ///
    /// Expired rows are filtered out, so "expired" and "never existed" look
    /// the same to the caller.
    pub async fn find_active_by_hash(
        pool: &PgPool,
        session_hash: &str,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_sessions
             WHERE session_hash = $1
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(session_hash)
            .fetch_optional(pool)
            .await
    }

    /// Delete a single session. Returns `true` if a row was removed.
    pub async fn delete_by_hash(pool: &PgPool, session_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE session_hash = $1")
            .bind(session_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session owned by a user. Returns the count of deleted rows.
    pub async fn delete_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired sessions. Returns the count of deleted rows.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
