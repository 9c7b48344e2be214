//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /signup      -> signup           (public)
/// POST /login       -> login            (public)
/// POST /logout      -> logout           (public, idempotent)
/// POST /logout-all  -> logout_all
/// GET  /session     -> current_session
/// GET  /csrf        -> issue_csrf
/// POST /password    -> change_password  (requires X-CSRF-Token)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/logout-all", post(auth::logout_all))
        .route("/session", get(auth::current_session))
        .route("/csrf", get(auth::issue_csrf))
        .route("/password", post(auth::change_password))
}
