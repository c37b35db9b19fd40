use thiserror::Error;

/// Authentication failures.
///
/// `InvalidCredentials` deliberately carries no detail: unknown email, wrong
/// password and a disabled account all collapse into it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("these credentials do not match our records")]
    InvalidCredentials,

    /// A stored password hash could not be parsed or verified.
    #[error("credential verification failed: {0}")]
    Crypto(String),

    #[error("identity store error: {0}")]
    Store(String),

    #[error("email already registered in this realm")]
    DuplicateEmail,

    /// The configured binding lifetime does not yield a usable window.
    #[error("session lifetime out of range")]
    LifetimeOutOfRange,
}
