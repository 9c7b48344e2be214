//! Request handlers.
//!
//! Handlers delegate to the repositories in `bazaar_db` and the session
//! layer, and map errors via [`AppError`](crate::error::AppError).

pub mod auth;
