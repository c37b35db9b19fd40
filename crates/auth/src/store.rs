//! Identity stores, one per realm.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use reskill_core::{EmailAddress, IdentityId};

use crate::error::AuthError;
use crate::identity::Identity;

/// Identity persistence for a single realm.
///
/// Admin and company identities live in two disjoint stores; nothing in this
/// trait can look across realms.
pub trait IdentityStore<I: Identity>: Send + Sync {
    fn find_by_email(&self, email: &EmailAddress) -> Result<Option<I>, AuthError>;

    fn get(&self, id: IdentityId) -> Result<Option<I>, AuthError>;

    /// Insert a new identity. Emails are unique within the store.
    fn insert(&self, identity: I) -> Result<(), AuthError>;

    /// Replace an existing identity (e.g. an administrator deactivating it).
    fn update(&self, identity: I) -> Result<(), AuthError>;

    /// Stamp `last_login_at` on a successful authentication.
    fn record_login(&self, id: IdentityId, at: DateTime<Utc>) -> Result<(), AuthError>;

    fn list(&self) -> Result<Vec<I>, AuthError>;
}

impl<I, S> IdentityStore<I> for Arc<S>
where
    I: Identity,
    S: IdentityStore<I> + ?Sized,
{
    fn find_by_email(&self, email: &EmailAddress) -> Result<Option<I>, AuthError> {
        (**self).find_by_email(email)
    }

    fn get(&self, id: IdentityId) -> Result<Option<I>, AuthError> {
        (**self).get(id)
    }

    fn insert(&self, identity: I) -> Result<(), AuthError> {
        (**self).insert(identity)
    }

    fn update(&self, identity: I) -> Result<(), AuthError> {
        (**self).update(identity)
    }

    fn record_login(&self, id: IdentityId, at: DateTime<Utc>) -> Result<(), AuthError> {
        (**self).record_login(id, at)
    }

    fn list(&self) -> Result<Vec<I>, AuthError> {
        (**self).list()
    }
}

/// In-memory identity store for tests/dev.
#[derive(Debug)]
pub struct InMemoryIdentityStore<I> {
    inner: RwLock<HashMap<IdentityId, I>>,
}

impl<I> InMemoryIdentityStore<I> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<I> Default for InMemoryIdentityStore<I> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> AuthError {
    AuthError::Store("identity store lock poisoned".to_string())
}

impl<I: Identity> IdentityStore<I> for InMemoryIdentityStore<I> {
    fn find_by_email(&self, email: &EmailAddress) -> Result<Option<I>, AuthError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|i| i.email() == email).cloned())
    }

    fn get(&self, id: IdentityId) -> Result<Option<I>, AuthError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn insert(&self, identity: I) -> Result<(), AuthError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.values().any(|i| i.email() == identity.email()) {
            return Err(AuthError::DuplicateEmail);
        }
        map.insert(identity.id(), identity);
        Ok(())
    }

    fn update(&self, identity: I) -> Result<(), AuthError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map
            .values()
            .any(|i| i.id() != identity.id() && i.email() == identity.email())
        {
            return Err(AuthError::DuplicateEmail);
        }
        match map.get_mut(&identity.id()) {
            Some(slot) => {
                *slot = identity;
                Ok(())
            }
            None => Err(AuthError::Store(format!("identity {} not found", identity.id()))),
        }
    }

    fn record_login(&self, id: IdentityId, at: DateTime<Utc>) -> Result<(), AuthError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(&id) {
            Some(identity) => {
                identity.record_login(at);
                Ok(())
            }
            None => Err(AuthError::Store(format!("identity {id} not found"))),
        }
    }

    fn list(&self) -> Result<Vec<I>, AuthError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().cloned().collect())
    }
}
