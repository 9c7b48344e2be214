//! Argon2id password hashing and strength rules.
//!
//! Hashes are stored in PHC string form, which embeds the algorithm,
//! parameters, and salt alongside the digest.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use bazaar_core::error::CoreError;

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Longest accepted password, in characters. Bounds hashing cost per request.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(format!("Password hashing failed: {e}")))
}

/// Check `password` against a stored PHC hash.
///
/// A stored hash that does not parse is an internal error, not a mismatch.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CoreError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| CoreError::Internal(format!("Stored password hash is invalid: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CoreError::Internal(format!("Password verification failed: {e}"))),
    }
}

/// Enforce the length bounds on a new password.
pub fn validate_password_strength(password: &str) -> Result<(), CoreError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse-battery-staple", &hash).unwrap());
        assert!(!verify_password("wrong-horse-battery-staple", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("correct-horse-battery-staple").unwrap();
        let b = hash_password("correct-horse-battery-staple").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn corrupt_stored_hash_is_internal() {
        assert_matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(CoreError::Internal(_))
        );
    }

    #[test]
    fn strength_bounds() {
        assert_matches!(validate_password_strength("short"), Err(CoreError::Validation(_)));
        assert!(validate_password_strength("twelve_chars").is_ok());
        let long = "x".repeat(MAX_PASSWORD_LENGTH + 1);
        assert_matches!(validate_password_strength(&long), Err(CoreError::Validation(_)));
    }
}
