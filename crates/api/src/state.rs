use std::sync::Arc;

use bazaar_core::csrf::CsrfTokenIssuer;
use bazaar_events::EventBus;

use crate::config::ServerConfig;
use crate::middleware::auth_gate::AuthGate;
use crate::session::SessionManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: bazaar_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The session strategy selected at startup.
    pub sessions: Arc<dyn SessionManager>,
    /// Issues and verifies CSRF tokens bound to a session.
    pub csrf: Arc<CsrfTokenIssuer>,
    /// In-process bus for cross-domain events.
    pub event_bus: Arc<EventBus>,
    /// Paths reachable without a session.
    pub gate: Arc<AuthGate>,
}
