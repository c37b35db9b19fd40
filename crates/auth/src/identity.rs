//! Identity records for both realms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reskill_core::{EmailAddress, IdentityId, TenantId};

use crate::password::PasswordHash;

/// Capability shared by every authenticatable record.
pub trait Identity: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> IdentityId;

    fn email(&self) -> &EmailAddress;

    fn password_hash(&self) -> &PasswordHash;

    fn last_login_at(&self) -> Option<DateTime<Utc>>;

    fn record_login(&mut self, at: DateTime<Utc>);

    /// Realm-mandatory predicate checked on every credential verification
    /// and on every session check.
    fn may_authenticate(&self) -> bool {
        true
    }
}

/// A system administrator. Admins have no tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: IdentityId,
    pub name: String,
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl AdminIdentity {
    pub fn new(name: impl Into<String>, email: EmailAddress, password_hash: PasswordHash) -> Self {
        Self {
            id: IdentityId::new(),
            name: name.into(),
            email,
            password_hash,
            last_login_at: None,
        }
    }
}

impl Identity for AdminIdentity {
    fn id(&self) -> IdentityId {
        self.id
    }

    fn email(&self) -> &EmailAddress {
        &self.email
    }

    fn password_hash(&self) -> &PasswordHash {
        &self.password_hash
    }

    fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = Some(at);
    }
}

/// A user acting on behalf of exactly one company.
///
/// # Invariants
/// - `tenant_id` is fixed at construction; there is no setter.
/// - Inactive users never authenticate, whatever the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyIdentity {
    id: IdentityId,
    tenant_id: TenantId,
    pub name: String,
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl CompanyIdentity {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        email: EmailAddress,
        password_hash: PasswordHash,
    ) -> Self {
        Self {
            id: IdentityId::new(),
            tenant_id,
            name: name.into(),
            email,
            password_hash,
            is_active: true,
            last_login_at: None,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl Identity for CompanyIdentity {
    fn id(&self) -> IdentityId {
        self.id
    }

    fn email(&self) -> &EmailAddress {
        &self.email
    }

    fn password_hash(&self) -> &PasswordHash {
        &self.password_hash
    }

    fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = Some(at);
    }

    fn may_authenticate(&self) -> bool {
        self.is_active
    }
}
