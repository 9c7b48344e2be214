//! Self-contained signed session tokens.
//!
//! The whole session record travels in the `session` cookie as an HS256
//! JWT. Nothing is stored server-side, so a token stays valid until it
//! expires. Revoking it anywhere but on the presenting device is not
//! possible.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use bazaar_core::error::SessionError;
use bazaar_core::session::{generate_session_id, session_log_id, Session, SESSION_LIFETIME_DAYS};
use bazaar_core::types::{DbId, Timestamp};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::cookie::{append_set_cookie, read_cookie, CookieSettings, TOKEN_SESSION_COOKIE};
use super::{build_session, ClientInfo, SessionManager};
use crate::geo::GeoResolver;

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionClaims {
    /// Subject -- the owning user's id.
    pub sub: DbId,
    /// Session id, used for log correlation and CSRF binding.
    pub sid: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    pub remote_ip: String,
    pub browser: String,
    pub operating_system: String,
    pub city: String,
    pub location: String,
}

impl SessionClaims {
    fn from_session(session: &Session) -> Self {
        let iat = session.created_at.timestamp();
        Self {
            sub: session.user_id,
            sid: session.id.clone(),
            iat,
            exp: iat + Duration::days(SESSION_LIFETIME_DAYS).num_seconds(),
            remote_ip: session.remote_ip.clone(),
            browser: session.browser.clone(),
            operating_system: session.operating_system.clone(),
            city: session.city.clone(),
            location: session.location.clone(),
        }
    }

    fn into_session(self) -> Result<Session, SessionError> {
        let issued = DateTime::from_timestamp(self.iat, 0).ok_or(SessionError::NoAuth)?;
        Ok(Session {
            id: self.sid,
            user_id: self.sub,
            remote_ip: self.remote_ip,
            browser: self.browser,
            operating_system: self.operating_system,
            city: self.city,
            location: self.location,
            created_at: issued,
            first_login: issued,
            last_login: issued,
        })
    }
}

/// Stateless session strategy.
pub struct TokenSessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    geo: Arc<GeoResolver>,
    cookies: CookieSettings,
}

impl TokenSessionManager {
    pub fn new(secret: &str, geo: Arc<GeoResolver>, cookies: CookieSettings) -> Self {
        // Expiry is exact: no clock-skew allowance past `exp`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            geo,
            cookies,
        }
    }

    /// Sign `session` into a token string.
    pub fn encode_session(&self, session: &Session) -> Result<String, SessionError> {
        encode(
            &Header::new(Algorithm::HS256),
            &SessionClaims::from_session(session),
            &self.encoding,
        )
        .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Verify and unpack a token. Bad signatures, expired tokens, and
    /// garbage all come back as [`SessionError::NoAuth`].
    pub fn decode_session(&self, token: &str) -> Result<Session, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            SessionError::NoAuth
        })?;
        data.claims.into_session()
    }

    fn expire_cookie(&self, response: &mut HeaderMap) -> Result<(), SessionError> {
        append_set_cookie(response, self.cookies.expired_cookie(TOKEN_SESSION_COOKIE))
    }
}

/// Current time truncated to whole seconds, the resolution tokens carry.
fn now_seconds() -> Timestamp {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

#[async_trait]
impl SessionManager for TokenSessionManager {
    fn cookie_name(&self) -> &'static str {
        TOKEN_SESSION_COOKIE
    }

    fn revokes_all_devices(&self) -> bool {
        false
    }

    async fn check(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let token = read_cookie(headers, TOKEN_SESSION_COOKIE).ok_or(SessionError::NoAuth)?;
        self.decode_session(token)
    }

    async fn create(
        &self,
        response: &mut HeaderMap,
        user_id: DbId,
        client: &ClientInfo,
    ) -> Result<Session, SessionError> {
        let session = build_session(
            generate_session_id(),
            user_id,
            client,
            &self.geo,
            now_seconds(),
        )
        .await;

        let token = self.encode_session(&session)?;
        append_set_cookie(
            response,
            self.cookies.session_cookie(TOKEN_SESSION_COOKIE, &token),
        )?;

        tracing::info!(
            user_id,
            session = %session.log_id(),
            ip = %session.remote_ip,
            city = %session.city,
            "Session token issued"
        );
        Ok(session)
    }

    async fn destroy_current(
        &self,
        response: &mut HeaderMap,
        headers: &HeaderMap,
    ) -> Result<(), SessionError> {
        self.expire_cookie(response)?;
        if let Some(session) = read_cookie(headers, TOKEN_SESSION_COOKIE)
            .and_then(|token| self.decode_session(token).ok())
        {
            tracing::info!(session = %session_log_id(&session.id), "Session token cleared");
        }
        Ok(())
    }

    async fn destroy_all(
        &self,
        response: &mut HeaderMap,
        user_id: DbId,
    ) -> Result<(), SessionError> {
        self.expire_cookie(response)?;
        tracing::warn!(
            user_id,
            "Token sessions cannot be revoked server-side; only the current cookie was cleared"
        );
        Ok(())
    }
}
