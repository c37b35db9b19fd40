//! Server-side session records.
//!
//! A session is owned by exactly one realm's store. It carries the anti-forgery
//! token for that realm's forms and, once authenticated, a [`Binding`] to one
//! identity.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use thiserror::Error;
use tracing::debug;

use reskill_core::IdentityId;

fn random_hex(len_bytes: usize) -> String {
    let mut bytes = vec![0u8; len_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut out = String::with_capacity(len_bytes * 2);
    for b in &bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Opaque session identifier carried in the realm cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(random_hex(32))
    }

    /// Accept an id presented by a client. Only the shape is checked here;
    /// whether it names a live session is the store's business.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionId(<redacted>)")
    }
}

/// Anti-forgery token bound to one session.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn generate() -> Self {
        Self(random_hex(32))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a client-supplied token.
    pub fn matches(&self, presented: &str) -> bool {
        let a = self.0.as_bytes();
        let b = presented.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl core::fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

/// An authenticated identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub identity_id: IdentityId,
    pub bound_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Long-lived ("remember me") rather than browser-session lifetime.
    pub remember: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("session binding has expired")]
    Expired,

    #[error("session binding not yet valid (bound_at is in the future)")]
    NotYetValid,

    #[error("invalid binding time window (expires_at <= bound_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a binding's time window.
pub fn validate_binding(binding: &Binding, now: DateTime<Utc>) -> Result<(), BindingError> {
    if binding.expires_at <= binding.bound_at {
        return Err(BindingError::InvalidTimeWindow);
    }
    if now < binding.bound_at {
        return Err(BindingError::NotYetValid);
    }
    if now >= binding.expires_at {
        return Err(BindingError::Expired);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub csrf_token: CsrfToken,
    pub binding: Option<Binding>,
    /// Where to send the user after a successful login.
    pub intended_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last time the session was written by the guard.
    pub last_seen_at: DateTime<Utc>,
}

impl Session {
    /// A fresh unauthenticated session with new id and token.
    pub fn guest(now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            csrf_token: CsrfToken::generate(),
            binding: None,
            intended_url: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    /// A bound session lives as long as its binding; a guest session lives
    /// `guest_ttl` past its last write.
    pub fn expires_at(&self, guest_ttl: Duration) -> DateTime<Utc> {
        match &self.binding {
            Some(binding) => binding.expires_at,
            None => self
                .last_seen_at
                .checked_add_signed(guest_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, guest_ttl: Duration, now: DateTime<Utc>) -> bool {
        now >= self.expires_at(guest_ttl)
    }
}

/// Session persistence for a single realm.
///
/// Expired sessions are never handed out by `load`.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId, now: DateTime<Utc>) -> Option<Session>;

    fn save(&self, session: Session, now: DateTime<Utc>);

    fn destroy(&self, id: &SessionId);
}

/// Saves between two sweeps of expired sessions.
const SWEEP_EVERY: usize = 256;

#[derive(Debug, Default)]
struct Sessions {
    by_id: HashMap<SessionId, Session>,
    saves_since_sweep: usize,
}

/// In-memory session store for tests/dev.
#[derive(Debug)]
pub struct InMemorySessionStore {
    inner: RwLock<Sessions>,
    guest_ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_guest_ttl(Duration::hours(2))
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long an unauthenticated session survives without being written.
    pub fn with_guest_ttl(guest_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Sessions::default()),
            guest_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session expired at `now`. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut sessions) = self.inner.write() else {
            return 0;
        };
        Self::sweep_locked(&mut sessions, self.guest_ttl, now)
    }

    fn sweep_locked(sessions: &mut Sessions, guest_ttl: Duration, now: DateTime<Utc>) -> usize {
        let before = sessions.by_id.len();
        sessions.by_id.retain(|_, s| !s.is_expired(guest_ttl, now));
        sessions.saves_since_sweep = 0;
        before - sessions.by_id.len()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, id: &SessionId, now: DateTime<Utc>) -> Option<Session> {
        let sessions = self.inner.read().ok()?;
        let session = sessions.by_id.get(id)?;
        if session.is_expired(self.guest_ttl, now) {
            drop(sessions);
            self.destroy(id);
            return None;
        }
        Some(session.clone())
    }

    fn save(&self, session: Session, now: DateTime<Utc>) {
        let Ok(mut sessions) = self.inner.write() else {
            return;
        };
        sessions.by_id.insert(session.id.clone(), session);
        sessions.saves_since_sweep += 1;
        if sessions.saves_since_sweep >= SWEEP_EVERY {
            let removed = Self::sweep_locked(&mut sessions, self.guest_ttl, now);
            if removed > 0 {
                debug!(removed, "expired sessions swept");
            }
        }
    }

    fn destroy(&self, id: &SessionId) {
        if let Ok(mut sessions) = self.inner.write() {
            sessions.by_id.remove(id);
        }
    }
}
