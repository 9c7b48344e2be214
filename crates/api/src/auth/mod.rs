//! Credential primitives used by the login and registration flows.
//!
//! - [`password`] -- Argon2id password hashing and verification.

pub mod password;
