//! Handlers for the `/auth` resource (signup, login, logout, session, CSRF,
//! password change).

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bazaar_core::csrf::CSRF_TOKEN_TTL_SECS;
use bazaar_core::error::{CoreError, SessionError};
use bazaar_core::session::Session;
use bazaar_core::types::{DbId, Timestamp};
use bazaar_db::models::user::{CreateUser, UserResponse};
use bazaar_db::repositories::UserRepo;
use bazaar_events::{PasswordChanged, UserLoggedIn, UserRegistered};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth_gate::CurrentSession;
use crate::middleware::csrf::RequireCsrf;
use crate::response::DataResponse;
use crate::session::cookie::{append_set_cookie, CookieSettings, CSRF_HEADER};
use crate::session::ClientInfo;
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /auth/password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The caller's session, without its id.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: DbId,
    pub remote_ip: String,
    pub browser: String,
    pub operating_system: String,
    pub city: String,
    pub location: String,
    pub created_at: Timestamp,
    pub first_login: Timestamp,
    pub last_login: Timestamp,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            remote_ip: session.remote_ip,
            browser: session.browser,
            operating_system: session.operating_system,
            city: session.city,
            location: session.location,
            created_at: session.created_at,
            first_login: session.first_login,
            last_login: session.last_login,
        }
    }
}

/// Body returned by signup and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub session: SessionResponse,
}

/// Body returned by `GET /auth/csrf`.
#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    pub token: String,
    /// Unix timestamp after which the token is rejected.
    pub expires_at: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/signup
///
/// Create an account and log it in. Publishes [`UserRegistered`].
pub async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<DataResponse<AuthResponse>>)> {
    input.validate()?;
    validate_password_strength(&input.password)?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: input.username,
            email: input.email,
            password_hash: hash_password(&input.password)?,
        },
    )
    .await?;

    // The account exists from here on, even if the session below fails.
    state.event_bus.publish(UserRegistered {
        user_id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
    });
    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    let mut headers = HeaderMap::new();
    let session = state.sessions.create(&mut headers, user.id, &client).await?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(DataResponse {
            data: AuthResponse {
                user: UserResponse::from(&user),
                session: session.into(),
            },
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Verify credentials and establish a session. Publishes [`UserLoggedIn`].
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<DataResponse<AuthResponse>>)> {
    let user = UserRepo::find_by_username(&state.pool, &input.username)
        .await?
        .ok_or_else(|| CoreError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    if !verify_password(&input.password, &user.password_hash)? {
        tracing::info!(user_id = user.id, ip = %client.remote_ip, "Login rejected");
        return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.into()).into());
    }

    let mut headers = HeaderMap::new();
    let session = state.sessions.create(&mut headers, user.id, &client).await?;

    state.event_bus.publish(UserLoggedIn {
        user_id: user.id,
        remote_ip: session.remote_ip.clone(),
        city: session.city.clone(),
        browser: session.browser.clone(),
    });

    Ok((
        headers,
        Json(DataResponse {
            data: AuthResponse {
                user: UserResponse::from(&user),
                session: session.into(),
            },
        }),
    ))
}

/// POST /api/v1/auth/logout
///
/// End the current session. Public and idempotent: the cookie is expired
/// even when there is no session, and even when the store call fails.
pub async fn logout(State(state): State<AppState>, request_headers: HeaderMap) -> Response {
    let mut headers = HeaderMap::new();
    match state
        .sessions
        .destroy_current(&mut headers, &request_headers)
        .await
    {
        Ok(()) => (headers, StatusCode::NO_CONTENT).into_response(),
        Err(e) => (headers, AppError::from(e)).into_response(),
    }
}

/// POST /api/v1/auth/logout-all
///
/// End every session of the caller that the active backend can reach.
pub async fn logout_all(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut headers = HeaderMap::new();
    state
        .sessions
        .destroy_all(&mut headers, session.user_id)
        .await?;
    Ok((headers, StatusCode::NO_CONTENT))
}

/// GET /api/v1/auth/session
pub async fn current_session(
    CurrentSession(session): CurrentSession,
) -> Json<DataResponse<SessionResponse>> {
    Json(DataResponse {
        data: session.into(),
    })
}

/// GET /api/v1/auth/csrf
///
/// Issue a CSRF token bound to the current session, valid for one day.
/// The token is returned in the body, the `X-CSRF-Token` header, and the
/// `csrf_token` cookie.
pub async fn issue_csrf(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> AppResult<(HeaderMap, Json<DataResponse<CsrfResponse>>)> {
    let expires_at = Utc::now().timestamp() + CSRF_TOKEN_TTL_SECS;
    let token = state.csrf.create(&session.id, expires_at)?;

    let mut headers = HeaderMap::new();
    let header_value = HeaderValue::from_str(&token)
        .map_err(|_| SessionError::Signing("CSRF token is not a valid header".into()))?;
    headers.insert(CSRF_HEADER, header_value);
    let cookies = CookieSettings {
        secure: state.config.session.cookie_secure,
    };
    append_set_cookie(&mut headers, cookies.csrf_cookie(&token))?;

    Ok((
        headers,
        Json(DataResponse {
            data: CsrfResponse { token, expires_at },
        }),
    ))
}

/// POST /api/v1/auth/password
///
/// Replace the caller's password and revoke their sessions. Requires a
/// CSRF token. Publishes [`PasswordChanged`].
pub async fn change_password(
    State(state): State<AppState>,
    RequireCsrf(session): RequireCsrf,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: session.user_id,
        })?;

    if !verify_password(&input.current_password, &user.password_hash)? {
        return Err(CoreError::Unauthorized("Current password is incorrect".into()).into());
    }
    validate_password_strength(&input.new_password)?;

    let new_hash = hash_password(&input.new_password)?;

    // Revoke before saving: a failure here leaves the old password and no
    // sessions, never the new password with old sessions still alive.
    let mut headers = HeaderMap::new();
    state.sessions.destroy_all(&mut headers, user.id).await?;

    if let Err(e) = UserRepo::update_password_hash(&state.pool, user.id, &new_hash).await {
        tracing::error!(
            user_id = user.id,
            error = %e,
            "Sessions revoked but new password not saved"
        );
        return Err(e.into());
    }

    state.event_bus.publish(PasswordChanged {
        user_id: user.id,
        other_devices_revoked: state.sessions.revokes_all_devices(),
    });
    tracing::info!(user_id = user.id, "Password changed");

    Ok((headers, StatusCode::NO_CONTENT))
}
