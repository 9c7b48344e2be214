//! Server-side session records for the database-backed session manager.

use std::collections::HashMap;

use async_trait::async_trait;
use bazaar_core::error::SessionError;
use bazaar_core::session::{hash_session_id, Session};
use bazaar_core::types::{DbId, Timestamp};
use bazaar_db::models::session::CreateSession;
use bazaar_db::repositories::SessionRepo;
use bazaar_db::DbPool;
use chrono::Utc;
use tokio::sync::RwLock;

/// Persistence for full session records, keyed by session id.
///
/// Implementations must treat expired records as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session, expires_at: Timestamp) -> Result<(), SessionError>;

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    /// Remove one session. Returns `false` if it did not exist.
    async fn remove(&self, session_id: &str) -> Result<bool, SessionError>;

    /// Remove every session of `user_id`. Returns how many were removed.
    async fn remove_all_for_user(&self, user_id: DbId) -> Result<u64, SessionError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Sessions in the `user_sessions` table, stored under the id's SHA-256.
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session, expires_at: Timestamp) -> Result<(), SessionError> {
        let input = CreateSession {
            session_hash: hash_session_id(&session.id),
            user_id: session.user_id,
            remote_ip: session.remote_ip.clone(),
            browser: session.browser.clone(),
            operating_system: session.operating_system.clone(),
            city: session.city.clone(),
            location: session.location.clone(),
            created_at: session.created_at,
            first_login: session.first_login,
            last_login: session.last_login,
            expires_at,
        };
        SessionRepo::create(&self.pool, &input)
            .await
            .map_err(|e| SessionError::store("session insert", e))?;
        Ok(())
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let row = SessionRepo::find_active_by_hash(&self.pool, &hash_session_id(session_id))
            .await
            .map_err(|e| SessionError::store("session lookup", e))?;
        Ok(row.map(|row| row.into_session(session_id.to_string())))
    }

    async fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        SessionRepo::delete_by_hash(&self.pool, &hash_session_id(session_id))
            .await
            .map_err(|e| SessionError::store("session delete", e))
    }

    async fn remove_all_for_user(&self, user_id: DbId) -> Result<u64, SessionError> {
        SessionRepo::delete_all_for_user(&self.pool, user_id)
            .await
            .map_err(|e| SessionError::store("session bulk delete", e))
    }
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Sessions held in process memory, for single-node development setups
/// and tests. Lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, (Session, Timestamp)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session, expires_at: Timestamp) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(hash_session_id(&session.id), (session.clone(), expires_at));
        Ok(())
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .await
            .get(&hash_session_id(session_id))
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(session, _)| session.clone()))
    }

    async fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self
            .sessions
            .write()
            .await
            .remove(&hash_session_id(session_id))
            .is_some())
    }

    async fn remove_all_for_user(&self, user_id: DbId) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, (session, _)| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use bazaar_core::session::generate_session_id;
    use chrono::Duration;

    use super::*;

    fn session_for(user_id: DbId) -> Session {
        let now = Utc::now();
        Session {
            id: generate_session_id(),
            user_id,
            remote_ip: "1.2.3.4".into(),
            browser: "Firefox".into(),
            operating_system: "Linux".into(),
            city: "Berlin".into(),
            location: "52.52,13.405".into(),
            created_at: now,
            first_login: now,
            last_login: now,
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let session = session_for(1);
        store
            .insert(&session, Utc::now() + Duration::days(1))
            .await
            .unwrap();

        assert_eq!(store.find(&session.id).await.unwrap(), Some(session.clone()));
        assert!(store.remove(&session.id).await.unwrap());
        assert!(!store.remove(&session.id).await.unwrap());
        assert_eq!(store.find(&session.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_hides_expired_sessions() {
        let store = MemorySessionStore::new();
        let session = session_for(1);
        store
            .insert(&session, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(store.find(&session.id).await.unwrap(), None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_bulk_remove_is_scoped_to_user() {
        let store = MemorySessionStore::new();
        let expires = Utc::now() + Duration::days(1);
        for _ in 0..3 {
            store.insert(&session_for(42), expires).await.unwrap();
        }
        let other = session_for(7);
        store.insert(&other, expires).await.unwrap();

        assert_eq!(store.remove_all_for_user(42).await.unwrap(), 3);
        assert_eq!(store.len().await, 1);
        assert!(store.find(&other.id).await.unwrap().is_some());
    }
}
