//! Session guard: binds one realm's identity to that realm's sessions.
//!
//! Two instances exist at runtime (`SessionGuard<AdminRealm>` and
//! `SessionGuard<CompanyRealm>`), each constructed with its own session store.
//! They share nothing, so both realms can be signed in from the same browser
//! without either seeing the other.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::AuthError;
use crate::identity::Identity;
use crate::realm::Realm;
use crate::session::{Binding, Session, SessionId, SessionStore, validate_binding};
use crate::store::IdentityStore;
use crate::verifier::{CredentialVerifier, Credentials, Predicate};

#[derive(Debug, Copy, Clone)]
pub struct SessionLifetimes {
    /// Lifetime of a session-only binding.
    pub session: Duration,
    /// Lifetime of a remembered binding.
    pub remember: Duration,
}

impl Default for SessionLifetimes {
    fn default() -> Self {
        Self {
            session: Duration::minutes(120),
            remember: Duration::days(30),
        }
    }
}

/// Outcome of a successful [`SessionGuard::attempt`].
#[derive(Debug, Clone)]
pub struct Authenticated<I> {
    pub identity: I,
    /// The regenerated session; its id differs from any id presented before.
    pub session: Session,
    /// Intended URL carried over from the guest session, if any.
    pub intended_url: Option<String>,
}

pub struct SessionGuard<R: Realm> {
    verifier: CredentialVerifier<R>,
    sessions: Arc<dyn SessionStore>,
    lifetimes: SessionLifetimes,
    _realm: PhantomData<R>,
}

impl<R: Realm> Clone for SessionGuard<R> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            sessions: self.sessions.clone(),
            lifetimes: self.lifetimes,
            _realm: PhantomData,
        }
    }
}

impl<R: Realm> SessionGuard<R> {
    pub fn new(
        identities: Arc<dyn IdentityStore<R::Identity>>,
        sessions: Arc<dyn SessionStore>,
        lifetimes: SessionLifetimes,
    ) -> Self {
        Self {
            verifier: CredentialVerifier::new(identities),
            sessions,
            lifetimes,
            _realm: PhantomData,
        }
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore<R::Identity>> {
        self.verifier.store()
    }

    pub fn lifetimes(&self) -> SessionLifetimes {
        self.lifetimes
    }

    /// Load the presented session, or start a guest session if there is none.
    pub fn start(&self, presented: Option<&SessionId>, now: DateTime<Utc>) -> Session {
        if let Some(session) = presented.and_then(|id| self.sessions.load(id, now)) {
            return session;
        }
        let session = Session::guest(now);
        self.sessions.save(session.clone(), now);
        session
    }

    /// The identity bound to the presented session, if the binding is still
    /// valid and the identity may still authenticate.
    ///
    /// Stale bindings are removed from the session as a side effect.
    pub fn user(&self, presented: Option<&SessionId>, now: DateTime<Utc>) -> Option<R::Identity> {
        let mut session = self.sessions.load(presented?, now)?;
        let binding = session.binding.clone()?;

        let identity = match validate_binding(&binding, now) {
            Ok(()) => self
                .identities()
                .get(binding.identity_id)
                .ok()
                .flatten()
                .filter(|i| i.may_authenticate()),
            Err(e) => {
                debug!(realm = %R::KIND, reason = %e, "dropping stale session binding");
                None
            }
        };

        if identity.is_none() {
            session.binding = None;
            session.last_seen_at = now;
            self.sessions.save(session, now);
        }
        identity
    }

    pub fn check(&self, presented: Option<&SessionId>, now: DateTime<Utc>) -> bool {
        self.user(presented, now).is_some()
    }

    /// Verify credentials and, on success, bind the identity to a brand-new
    /// session. The presented session (if any) is destroyed so its id can
    /// never become authenticated.
    ///
    /// On failure nothing is written.
    pub fn attempt(
        &self,
        presented: Option<&SessionId>,
        credentials: &Credentials,
        remember: bool,
        now: DateTime<Utc>,
    ) -> Result<Authenticated<R::Identity>, AuthError> {
        self.attempt_when(presented, credentials, remember, now, &[])
    }

    /// [`attempt`](Self::attempt) with additional predicates on the identity.
    pub fn attempt_when(
        &self,
        presented: Option<&SessionId>,
        credentials: &Credentials,
        remember: bool,
        now: DateTime<Utc>,
        extra: &[&Predicate<R::Identity>],
    ) -> Result<Authenticated<R::Identity>, AuthError> {
        let identity = self.verifier.verify(credentials, extra)?;

        let ttl = if remember {
            self.lifetimes.remember
        } else {
            self.lifetimes.session
        };
        let expires_at = now
            .checked_add_signed(ttl)
            .filter(|at| *at > now)
            .ok_or(AuthError::LifetimeOutOfRange)?;

        let intended_url = presented
            .and_then(|id| self.sessions.load(id, now))
            .and_then(|s| s.intended_url);
        if let Some(old) = presented {
            self.sessions.destroy(old);
        }

        let mut session = Session::guest(now);
        session.binding = Some(Binding {
            identity_id: identity.id(),
            bound_at: now,
            expires_at,
            remember,
        });
        self.sessions.save(session.clone(), now);

        info!(realm = %R::KIND, identity_id = %identity.id(), remember, "login succeeded");

        Ok(Authenticated {
            identity,
            session,
            intended_url,
        })
    }

    /// Unbind, invalidate the presented session and hand back a fresh guest
    /// session with a rotated anti-forgery token. Safe to call when already
    /// logged out.
    pub fn logout(&self, presented: Option<&SessionId>, now: DateTime<Utc>) -> Session {
        if let Some(old) = presented {
            if let Some(session) = self.sessions.load(old, now) {
                if let Some(binding) = session.binding {
                    info!(realm = %R::KIND, identity_id = %binding.identity_id, "logout");
                }
            }
            self.sessions.destroy(old);
        }
        let fresh = Session::guest(now);
        self.sessions.save(fresh.clone(), now);
        fresh
    }

    /// Remember where an unauthenticated visitor was heading. Returns the
    /// (possibly new) guest session holding the URL.
    pub fn remember_intended(
        &self,
        presented: Option<&SessionId>,
        url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Session {
        let mut session = self.start(presented, now);
        session.intended_url = Some(url.into());
        session.last_seen_at = now;
        self.sessions.save(session.clone(), now);
        session
    }

    /// Check a submitted anti-forgery token against the presented session.
    pub fn verify_csrf(&self, presented: Option<&SessionId>, token: &str, now: DateTime<Utc>) -> bool {
        presented
            .and_then(|id| self.sessions.load(id, now))
            .is_some_and(|s| s.csrf_token.matches(token))
    }
}
