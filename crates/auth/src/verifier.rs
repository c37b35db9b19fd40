//! Credential verification.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use reskill_core::EmailAddress;

use crate::error::AuthError;
use crate::identity::Identity;
use crate::password::{decoy_hash, verify_password};
use crate::realm::Realm;
use crate::store::IdentityStore;

/// Plaintext password as submitted. Never printed.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Password {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: EmailAddress,
    pub password: Password,
}

impl Credentials {
    pub fn new(email: EmailAddress, password: impl Into<String>) -> Self {
        Self {
            email,
            password: Password::new(password),
        }
    }
}

/// Additional caller-supplied condition an identity must satisfy.
pub type Predicate<I> = dyn Fn(&I) -> bool + Send + Sync;

/// Validates email/password pairs against one realm's identity store.
///
/// Pure lookup + check: no session state is touched, on success or failure.
pub struct CredentialVerifier<R: Realm> {
    store: Arc<dyn IdentityStore<R::Identity>>,
    _realm: PhantomData<R>,
}

impl<R: Realm> Clone for CredentialVerifier<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _realm: PhantomData,
        }
    }
}

impl<R: Realm> CredentialVerifier<R> {
    pub fn new(store: Arc<dyn IdentityStore<R::Identity>>) -> Self {
        Self {
            store,
            _realm: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore<R::Identity>> {
        &self.store
    }

    /// Look up exactly one identity by email and check the password, the
    /// realm's mandatory predicate and every `extra` predicate.
    ///
    /// Every rejection is `AuthError::InvalidCredentials`; the cause is never
    /// part of the result.
    pub fn verify(
        &self,
        credentials: &Credentials,
        extra: &[&Predicate<R::Identity>],
    ) -> Result<R::Identity, AuthError> {
        let Some(identity) = self.store.find_by_email(&credentials.email)? else {
            if let Some(decoy) = decoy_hash() {
                let _ = verify_password(credentials.password.expose(), decoy);
            }
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(credentials.password.expose(), identity.password_hash())? {
            return Err(AuthError::InvalidCredentials);
        }

        if !identity.may_authenticate() || !extra.iter().all(|p| p(&identity)) {
            warn!(
                target: "reskill::security",
                realm = %R::KIND,
                identity_id = %identity.id(),
                "credentials matched but identity is not allowed to authenticate"
            );
            return Err(AuthError::InvalidCredentials);
        }

        Ok(identity)
    }
}
