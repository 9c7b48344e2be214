//! Bazaar API server library.
//!
//! Exposes the session layer (managers, auth gate, CSRF), the geo resolver,
//! event listeners, and the router builder so integration tests and the
//! binary entrypoint can both access them.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod listeners;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod session;
pub mod state;
