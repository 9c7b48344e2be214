//! Domain types and primitives shared by every Bazaar crate.
//!
//! This crate has no internal dependencies so it can be used by the
//! repository layer, the event bus, and the HTTP server alike.

pub mod csrf;
pub mod error;
pub mod hashing;
pub mod session;
pub mod types;
pub mod user_agent;
