//! Domain events published by the authentication flows.

use bazaar_core::types::DbId;
use serde::Serialize;

use crate::bus::Event;

/// A new account was created.
#[derive(Debug, Clone, Serialize)]
pub struct UserRegistered {
    pub user_id: DbId,
    pub username: String,
    pub email: String,
}

impl Event for UserRegistered {
    const NAME: &'static str = "user.registered";
}

/// A session was established for an existing account.
#[derive(Debug, Clone, Serialize)]
pub struct UserLoggedIn {
    pub user_id: DbId,
    pub remote_ip: String,
    pub city: String,
    pub browser: String,
}

impl Event for UserLoggedIn {
    const NAME: &'static str = "user.logged_in";
}

/// A user's password was replaced and their sessions revoked.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordChanged {
    pub user_id: DbId,
    /// `false` when the active session backend cannot revoke sessions on
    /// other devices.
    pub other_devices_revoked: bool,
}

impl Event for PasswordChanged {
    const NAME: &'static str = "user.password_changed";
}
