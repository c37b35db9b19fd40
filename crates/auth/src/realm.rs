//! Authentication realms.
//!
//! A realm is an independent authentication context with its own identity
//! store and its own session storage. Realms are zero-sized marker types so a
//! guard for one realm can never be handed an identity of the other.

use serde::{Deserialize, Serialize};

use crate::identity::{AdminIdentity, CompanyIdentity, Identity};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealmKind {
    Admin,
    Company,
}

impl RealmKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RealmKind::Admin => "admin",
            RealmKind::Company => "company",
        }
    }
}

impl core::fmt::Display for RealmKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Realm: Send + Sync + 'static {
    type Identity: Identity;

    const KIND: RealmKind;
}

/// System administrators.
#[derive(Debug, Copy, Clone, Default)]
pub struct AdminRealm;

/// Users of a tenant company.
#[derive(Debug, Copy, Clone, Default)]
pub struct CompanyRealm;

impl Realm for AdminRealm {
    type Identity = AdminIdentity;

    const KIND: RealmKind = RealmKind::Admin;
}

impl Realm for CompanyRealm {
    type Identity = CompanyIdentity;

    const KIND: RealmKind = RealmKind::Company;
}
