//! Session establishment, validation, and revocation.
//!
//! [`SessionManager`] is the capability surface the rest of the server uses.
//! Two strategies implement it and one is picked at startup from
//! configuration, never per request:
//!
//! - [`DatabaseSessionManager`] -- opaque id in the `session_id` cookie,
//!   full record in a [`SessionStore`]. Can revoke every session of a user.
//! - [`TokenSessionManager`] -- the whole session signed into the `session`
//!   cookie. Needs no storage, but can only revoke the current device.

pub mod cookie;
pub mod database;
pub mod store;
pub mod token;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use bazaar_core::error::SessionError;
use bazaar_core::session::{Session, UNKNOWN};
use bazaar_core::types::{DbId, Timestamp};
use bazaar_core::user_agent::parse_user_agent;
use bazaar_db::DbPool;

use crate::config::{SessionBackend, SessionConfig};
use crate::geo::{client_ip, GeoResolver};

pub use cookie::CookieSettings;
pub use database::DatabaseSessionManager;
pub use store::{MemorySessionStore, PgSessionStore, SessionStore};
pub use token::TokenSessionManager;

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// The four session operations, independent of where sessions live.
///
/// The response carrier is the response [`HeaderMap`]: operations that
/// change the client's credential append a `Set-Cookie` header to it.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Name of the cookie this strategy reads and writes.
    fn cookie_name(&self) -> &'static str;

    /// Whether [`destroy_all`](Self::destroy_all) reaches sessions on other
    /// devices. `false` for the token strategy.
    fn revokes_all_devices(&self) -> bool;

    /// Resolve the session referenced by the request's cookie.
    ///
    /// Absent, malformed, unknown, and expired sessions all yield
    /// [`SessionError::NoAuth`]. Performs no writes.
    async fn check(&self, headers: &HeaderMap) -> Result<Session, SessionError>;

    /// Establish a new session for `user_id` and set its cookie (90 days,
    /// `Path=/`). Geo enrichment failures never fail the call.
    async fn create(
        &self,
        response: &mut HeaderMap,
        user_id: DbId,
        client: &ClientInfo,
    ) -> Result<Session, SessionError>;

    /// Invalidate the session referenced by the request and expire its
    /// cookie. Succeeds when the session is already gone.
    async fn destroy_current(
        &self,
        response: &mut HeaderMap,
        headers: &HeaderMap,
    ) -> Result<(), SessionError>;

    /// Invalidate every session owned by `user_id` that this strategy can
    /// reach, and expire the current cookie.
    async fn destroy_all(&self, response: &mut HeaderMap, user_id: DbId)
        -> Result<(), SessionError>;
}

/// Build the configured session strategy.
pub fn build_session_manager(
    config: &SessionConfig,
    pool: DbPool,
    geo: Arc<GeoResolver>,
) -> Arc<dyn SessionManager> {
    let cookies = CookieSettings {
        secure: config.cookie_secure,
    };
    match config.backend {
        SessionBackend::Database => Arc::new(DatabaseSessionManager::new(
            Arc::new(PgSessionStore::new(pool)),
            geo,
            cookies,
        )),
        SessionBackend::Token => Arc::new(TokenSessionManager::new(&config.secret, geo, cookies)),
    }
}

// ---------------------------------------------------------------------------
// ClientInfo
// ---------------------------------------------------------------------------

/// Request facts recorded on a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub remote_ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self {
            remote_ip: client_ip(headers, peer).unwrap_or_else(|| UNKNOWN.to_string()),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Ok(ClientInfo::from_headers(&parts.headers, peer))
    }
}

// ---------------------------------------------------------------------------
// Shared construction
// ---------------------------------------------------------------------------

/// Build a session record for `client`, enriched with geo data when
/// available. Both strategies create sessions through here.
pub(crate) async fn build_session(
    id: String,
    user_id: DbId,
    client: &ClientInfo,
    geo: &GeoResolver,
    now: Timestamp,
) -> Session {
    let agent = parse_user_agent(&client.user_agent);

    let (city, location) = match geo.resolve(&client.remote_ip).await {
        Ok(found) => (found.city.clone(), found.location_string()),
        Err(e) => {
            tracing::debug!(ip = %client.remote_ip, error = %e, "Geo enrichment skipped");
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        }
    };

    Session {
        id,
        user_id,
        remote_ip: client.remote_ip.clone(),
        browser: agent.browser,
        operating_system: agent.operating_system,
        city,
        location,
        created_at: now,
        first_login: now,
        last_login: now,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Doubles shared by the session manager tests.

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::geo::{GeoError, GeoLocation, GeoLookup};

    /// Answers every public IP with Berlin, or fails when `fail` is set.
    pub struct FixedLookup {
        pub fail: bool,
    }

    #[async_trait]
    impl GeoLookup for FixedLookup {
        async fn lookup(&self, _ip: &str) -> Result<GeoLocation, GeoError> {
            if self.fail {
                return Err(GeoError::Status { status: 500 });
            }
            Ok(GeoLocation {
                city: "Berlin".into(),
                country: "Germany".into(),
                latitude: 52.52,
                longitude: 13.405,
            })
        }
    }

    pub fn geo(fail: bool) -> Arc<GeoResolver> {
        Arc::new(GeoResolver::new(
            Arc::new(FixedLookup { fail }),
            Duration::minutes(10),
        ))
    }

    pub fn client() -> ClientInfo {
        ClientInfo {
            remote_ip: "1.2.3.4".into(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"
                .into(),
        }
    }

    /// Turn the `Set-Cookie` headers of a response into a request `Cookie`
    /// header, the way a browser would for unexpired cookies.
    pub fn echo_cookies(response: &HeaderMap) -> HeaderMap {
        let mut request = HeaderMap::new();
        for value in response.get_all(axum::http::header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().to_string();
            request.append(axum::http::header::COOKIE, pair.parse().unwrap());
        }
        request
    }
}
