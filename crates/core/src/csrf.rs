//! Session-bound CSRF tokens.
//!
//! A token is `"{expires_at}.{signature}"`, where `signature` is the hex
//! HMAC-SHA256 of `"{session_id}.{expires_at}"` under the server secret.
//! Nothing is persisted: validity is decided by the signature, the expiry,
//! and the session the token is presented with. Issuance does not depend on
//! which session backend is active.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Default CSRF token lifetime in seconds (matches the cookie `Max-Age`).
pub const CSRF_TOKEN_TTL_SECS: i64 = 86_400;

/// Mints and verifies CSRF tokens bound to a session id.
#[derive(Clone)]
pub struct CsrfTokenIssuer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CsrfTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfTokenIssuer").finish_non_exhaustive()
    }
}

impl CsrfTokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for `session_id` valid until `expires_at` (Unix seconds).
    pub fn create(&self, session_id: &str, expires_at: i64) -> Result<String, SessionError> {
        let signature = self.sign(session_id, expires_at)?.finalize().into_bytes();
        Ok(format!("{expires_at}.{}", hex::encode(signature)))
    }

    /// Check `token` against `session_id` at the current time.
    pub fn check(&self, session_id: &str, token: &str) -> Result<bool, SessionError> {
        self.check_at(session_id, token, chrono::Utc::now().timestamp())
    }

    /// Check `token` against `session_id` as of `now` (Unix seconds).
    ///
    /// Returns `Ok(false)` for an expired token or one minted for another
    /// session, and `Err(InvalidToken)` when the token is not even shaped
    /// like one of ours.
    pub fn check_at(&self, session_id: &str, token: &str, now: i64) -> Result<bool, SessionError> {
        let (expires_part, signature_part) = token
            .split_once('.')
            .ok_or_else(|| SessionError::InvalidToken("missing separator".into()))?;

        let expires_at: i64 = expires_part
            .parse()
            .map_err(|_| SessionError::InvalidToken("expiry is not a number".into()))?;

        let signature = hex::decode(signature_part)
            .ok_or_else(|| SessionError::InvalidToken("signature is not hex".into()))?;

        if expires_at < now {
            return Ok(false);
        }

        Ok(self
            .sign(session_id, expires_at)?
            .verify_slice(&signature)
            .is_ok())
    }

    fn sign(&self, session_id: &str, expires_at: i64) -> Result<HmacSha256, SessionError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SessionError::Signing(e.to_string()))?;
        mac.update(session_id.as_bytes());
        mac.update(b".");
        mac.update(expires_at.to_string().as_bytes());
        Ok(mac)
    }
}

// ---------------------------------------------------------------------------
// hex helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string, returning `None` on odd length or bad digits.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}
