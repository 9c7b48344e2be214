//! Sessions backed by a server-side store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use bazaar_core::error::SessionError;
use bazaar_core::session::{
    generate_session_id, is_well_formed_session_id, session_log_id, Session,
    SESSION_LIFETIME_DAYS,
};
use bazaar_core::types::DbId;
use chrono::{Duration, Utc};

use super::cookie::{append_set_cookie, read_cookie, CookieSettings, DATABASE_SESSION_COOKIE};
use super::store::SessionStore;
use super::{build_session, ClientInfo, SessionManager};
use crate::geo::GeoResolver;

/// The cookie holds only a random id; the record lives in the store.
///
/// Revocation is authoritative: deleting the record kills the session on
/// every device at once.
pub struct DatabaseSessionManager {
    store: Arc<dyn SessionStore>,
    geo: Arc<GeoResolver>,
    cookies: CookieSettings,
}

impl DatabaseSessionManager {
    pub fn new(store: Arc<dyn SessionStore>, geo: Arc<GeoResolver>, cookies: CookieSettings) -> Self {
        Self {
            store,
            geo,
            cookies,
        }
    }

    fn expire_cookie(&self, response: &mut HeaderMap) -> Result<(), SessionError> {
        append_set_cookie(response, self.cookies.expired_cookie(DATABASE_SESSION_COOKIE))
    }
}

#[async_trait]
impl SessionManager for DatabaseSessionManager {
    fn cookie_name(&self) -> &'static str {
        DATABASE_SESSION_COOKIE
    }

    fn revokes_all_devices(&self) -> bool {
        true
    }

    async fn check(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let id = read_cookie(headers, DATABASE_SESSION_COOKIE).ok_or(SessionError::NoAuth)?;
        if !is_well_formed_session_id(id) {
            return Err(SessionError::NoAuth);
        }
        self.store.find(id).await?.ok_or(SessionError::NoAuth)
    }

    async fn create(
        &self,
        response: &mut HeaderMap,
        user_id: DbId,
        client: &ClientInfo,
    ) -> Result<Session, SessionError> {
        let now = Utc::now();
        let session = build_session(generate_session_id(), user_id, client, &self.geo, now).await;

        self.store
            .insert(&session, now + Duration::days(SESSION_LIFETIME_DAYS))
            .await?;
        append_set_cookie(
            response,
            self.cookies
                .session_cookie(DATABASE_SESSION_COOKIE, &session.id),
        )?;

        tracing::info!(
            user_id,
            session = %session.log_id(),
            ip = %session.remote_ip,
            city = %session.city,
            "Session created"
        );
        Ok(session)
    }

    async fn destroy_current(
        &self,
        response: &mut HeaderMap,
        headers: &HeaderMap,
    ) -> Result<(), SessionError> {
        // Expire the cookie first so the client is logged out even if the
        // store call below fails.
        self.expire_cookie(response)?;

        let Some(id) = read_cookie(headers, DATABASE_SESSION_COOKIE)
            .filter(|id| is_well_formed_session_id(id))
        else {
            return Ok(());
        };

        let removed = self.store.remove(id).await?;
        tracing::info!(session = %session_log_id(id), removed, "Session destroyed");
        Ok(())
    }

    async fn destroy_all(
        &self,
        response: &mut HeaderMap,
        user_id: DbId,
    ) -> Result<(), SessionError> {
        self.expire_cookie(response)?;
        let removed = self.store.remove_all_for_user(user_id).await?;
        tracing::info!(user_id, removed, "All sessions destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;
    use axum::http::header::SET_COOKIE;
    use axum::http::HeaderValue;
    use bazaar_core::session::UNKNOWN;

    use super::super::store::MemorySessionStore;
    use super::super::testing::{client, echo_cookies, geo};
    use super::*;

    fn manager_with(store: Arc<MemorySessionStore>, geo_fails: bool) -> DatabaseSessionManager {
        DatabaseSessionManager::new(store, geo(geo_fails), CookieSettings::default())
    }

    fn set_cookies(response: &HeaderMap) -> Vec<String> {
        response
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn login_flow_records_user_and_city() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(Arc::clone(&store), false);
        let mut response = HeaderMap::new();

        let session = manager.create(&mut response, 42, &client()).await.unwrap();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.city, "Berlin");
        assert_eq!(session.remote_ip, "1.2.3.4");
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with(&format!("session_id={}; Path=/", session.id)));

        let checked = manager.check(&echo_cookies(&response)).await.unwrap();
        assert_eq!(checked, session);
    }

    #[tokio::test]
    async fn geo_failure_does_not_fail_creation() {
        let manager = manager_with(Arc::new(MemorySessionStore::new()), true);
        let mut response = HeaderMap::new();
        let session = manager.create(&mut response, 1, &client()).await.unwrap();
        assert_eq!(session.city, UNKNOWN);
        assert_eq!(session.location, UNKNOWN);
    }

    #[tokio::test]
    async fn created_ids_are_pairwise_distinct() {
        let manager = manager_with(Arc::new(MemorySessionStore::new()), false);
        let mut ids = HashSet::new();
        for _ in 0..500 {
            let mut response = HeaderMap::new();
            let session = manager.create(&mut response, 1, &client()).await.unwrap();
            assert!(ids.insert(session.id));
        }
    }

    #[tokio::test]
    async fn missing_malformed_and_unknown_cookies_are_no_auth() {
        let manager = manager_with(Arc::new(MemorySessionStore::new()), false);

        assert_matches!(manager.check(&HeaderMap::new()).await, Err(SessionError::NoAuth));

        let mut garbage = HeaderMap::new();
        garbage.insert("cookie", HeaderValue::from_static("session_id=../../etc/passwd"));
        assert_matches!(manager.check(&garbage).await, Err(SessionError::NoAuth));

        let mut unknown = HeaderMap::new();
        let cookie = format!("session_id={}", generate_session_id());
        unknown.insert("cookie", cookie.parse().unwrap());
        assert_matches!(manager.check(&unknown).await, Err(SessionError::NoAuth));
    }

    #[tokio::test]
    async fn destroy_current_is_idempotent() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(Arc::clone(&store), false);
        let mut login = HeaderMap::new();
        manager.create(&mut login, 42, &client()).await.unwrap();
        let request = echo_cookies(&login);

        for _ in 0..2 {
            let mut response = HeaderMap::new();
            manager.destroy_current(&mut response, &request).await.unwrap();
            let cookies = set_cookies(&response);
            assert_eq!(cookies.len(), 1);
            assert!(cookies[0].starts_with("session_id=; Path=/; Expires="));
        }

        assert!(store.is_empty().await);
        assert_matches!(manager.check(&request).await, Err(SessionError::NoAuth));
    }

    #[tokio::test]
    async fn destroy_current_without_cookie_still_expires_it() {
        let manager = manager_with(Arc::new(MemorySessionStore::new()), false);
        let mut response = HeaderMap::new();
        manager
            .destroy_current(&mut response, &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(set_cookies(&response).len(), 1);
    }

    #[tokio::test]
    async fn destroy_all_revokes_every_device_of_the_user() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(Arc::clone(&store), false);

        let mut laptop = HeaderMap::new();
        manager.create(&mut laptop, 42, &client()).await.unwrap();
        let mut phone = HeaderMap::new();
        manager.create(&mut phone, 42, &client()).await.unwrap();
        let mut other_user = HeaderMap::new();
        manager.create(&mut other_user, 7, &client()).await.unwrap();

        let mut response = HeaderMap::new();
        manager.destroy_all(&mut response, 42).await.unwrap();

        assert_matches!(manager.check(&echo_cookies(&laptop)).await, Err(SessionError::NoAuth));
        assert_matches!(manager.check(&echo_cookies(&phone)).await, Err(SessionError::NoAuth));
        assert!(manager.check(&echo_cookies(&other_user)).await.is_ok());
        assert!(manager.revokes_all_devices());
    }
}
