//! Reading and writing the credential cookies.
//!
//! Cookies are written as raw `Set-Cookie` header values appended to the
//! response header map handed to the session managers.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use bazaar_core::csrf::CSRF_TOKEN_TTL_SECS;
use bazaar_core::error::SessionError;
use bazaar_core::session::SESSION_LIFETIME_DAYS;
use bazaar_core::types::Timestamp;
use chrono::{Duration, Utc};

/// Cookie carrying the opaque id of a database-backed session.
pub const DATABASE_SESSION_COOKIE: &str = "session_id";

/// Cookie carrying a self-contained session token.
pub const TOKEN_SESSION_COOKIE: &str = "session";

/// Cookie mirroring the issued CSRF token.
pub const CSRF_COOKIE: &str = "csrf_token";

/// Response header carrying the issued CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Attributes shared by every cookie the server sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    /// `name=value`, site-wide, HTTP-only, expiring with the session.
    pub fn session_cookie(&self, name: &str, value: &str) -> String {
        let expires = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);
        self.finish(format!(
            "{name}={value}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
            http_date(expires)
        ))
    }

    /// Blank `name` with an expiry one day in the past.
    pub fn expired_cookie(&self, name: &str) -> String {
        let expires = Utc::now() - Duration::days(1);
        self.finish(format!(
            "{name}=; Path=/; Expires={}; HttpOnly; SameSite=Lax",
            http_date(expires)
        ))
    }

    /// The CSRF token mirror cookie.
    pub fn csrf_cookie(&self, token: &str) -> String {
        self.finish(format!(
            "{CSRF_COOKIE}={token}; Path=/; Max-Age={CSRF_TOKEN_TTL_SECS}; HttpOnly; SameSite=Lax"
        ))
    }

    fn finish(&self, mut cookie: String) -> String {
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Format a timestamp as an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn http_date(at: Timestamp) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Append a `Set-Cookie` header to `response`.
pub fn append_set_cookie(response: &mut HeaderMap, cookie: String) -> Result<(), SessionError> {
    let value = HeaderValue::try_from(cookie)
        .map_err(|_| SessionError::Signing("cookie value is not a valid header".into()))?;
    response.append(SET_COOKIE, value);
    Ok(())
}

/// Find the value of cookie `name` across all `Cookie` request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
