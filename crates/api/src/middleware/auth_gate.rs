//! Session gate in front of every non-public route.
//!
//! A request whose path is on the allow-list goes straight through without
//! the session store being consulted. Everything else must carry a valid
//! session; the resolved [`Session`] is attached to the request extensions
//! for [`CurrentSession`] to pick up downstream.

use std::collections::HashSet;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bazaar_core::error::SessionError;
use bazaar_core::session::Session;

use crate::error::AppError;
use crate::state::AppState;

/// Paths reachable without a session.
pub const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/api/v1/auth/signup",
    "/api/v1/auth/login",
    "/api/v1/auth/logout",
    "/api/v1/auth/password-reset",
    "/api/v1/auth/password-reset/confirm",
    "/api/v1/categories",
    "/api/v1/tasks/public",
    "/docs",
];

/// Path prefixes reachable without a session.
pub const PUBLIC_PREFIXES: &[&str] = &["/api/v1/profiles/", "/docs/"];

/// Allow-list of exact paths and path prefixes.
#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server's public surface.
    pub fn default_public() -> Self {
        PUBLIC_PATHS
            .iter()
            .fold(Self::new(), |gate, path| gate.allow_exact(*path))
            .allow_prefixes(PUBLIC_PREFIXES)
    }

    pub fn allow_exact(mut self, path: impl Into<String>) -> Self {
        self.exact.insert(path.into());
        self
    }

    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    fn allow_prefixes(self, prefixes: &[&str]) -> Self {
        prefixes
            .iter()
            .fold(self, |gate, prefix| gate.allow_prefix(*prefix))
    }

    /// Whether `path` bypasses the session check.
    pub fn is_public(&self, path: &str) -> bool {
        self.exact.contains(path) || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Middleware: let public paths through, require a session everywhere else.
///
/// Every way a session can be invalid yields the same 403 `NoAuth` body.
/// Store failures surface as 500.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.gate.is_public(request.uri().path()) {
        return next.run(request).await;
    }

    match state.sessions.check(request.headers()).await {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), error = %e, "Request denied by auth gate");
            AppError::Session(e).into_response()
        }
    }
}

/// The session resolved by [`require_session`].
///
/// Only usable on gated routes; on a public route it rejects with `NoAuth`.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or(AppError::Session(SessionError::NoAuth))
    }
}
