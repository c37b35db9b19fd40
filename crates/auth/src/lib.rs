//! `reskill-auth`: session-based authentication boundary for the two realms.
//!
//! Nothing here knows about HTTP. Cookies, forms and redirects live in the
//! API crate; this crate checks credentials and binds identities to
//! per-realm sessions.

pub mod error;
pub mod guard;
pub mod identity;
pub mod password;
pub mod realm;
pub mod session;
pub mod store;
pub mod verifier;

pub use error::AuthError;
pub use guard::{Authenticated, SessionGuard, SessionLifetimes};
pub use identity::{AdminIdentity, CompanyIdentity, Identity};
pub use password::{PasswordHash, hash_password, verify_password};
pub use realm::{AdminRealm, CompanyRealm, Realm, RealmKind};
pub use session::{
    Binding, BindingError, CsrfToken, InMemorySessionStore, Session, SessionId, SessionStore,
    validate_binding,
};
pub use store::{IdentityStore, InMemoryIdentityStore};
pub use verifier::{Credentials, CredentialVerifier, Password, Predicate};
