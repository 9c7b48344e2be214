//! Request gating and extractors built on the session layer.
//!
//! - [`auth_gate::require_session`] -- Middleware rejecting gated requests without a session.
//! - [`auth_gate::CurrentSession`] -- Extracts the session attached by the gate.
//! - [`csrf::RequireCsrf`] -- Requires a valid `X-CSRF-Token` for the current session.

pub mod auth_gate;
pub mod csrf;
