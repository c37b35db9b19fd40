//! Password hashing and verification using Argon2id.

use std::sync::OnceLock;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// An Argon2id PHC-format password digest.
///
/// Opaque on purpose: `Debug` never prints the digest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an already-computed PHC string (e.g. loaded from storage).
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<PasswordHash, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| PasswordHash(h.to_string()))
        .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
}

#[cfg(test)]
thread_local! {
    /// Argon2 verifications run on this thread.
    pub(crate) static VERIFICATIONS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Digest checked when no identity matches, so a lookup miss costs the same
/// Argon2 work as a wrong password.
pub(crate) fn decoy_hash() -> Option<&'static PasswordHash> {
    static DECOY: OnceLock<Option<PasswordHash>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password("reskill-decoy-password").ok())
        .as_ref()
}

/// Verify a plaintext password against a stored digest.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &PasswordHash) -> Result<bool, AuthError> {
    let parsed_hash = argon2::PasswordHash::new(&hash.0)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;
    #[cfg(test)]
    VERIFICATIONS.with(|n| n.set(n.get() + 1));

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}
