use thiserror::Error;

use crate::event::DomainEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// A record the event refers to could not be loaded.
    #[error("missing context: {0}")]
    MissingContext(String),

    #[error("tenant isolation violation")]
    TenantMismatch,

    #[error("storage error: {0}")]
    Storage(String),

    /// Follow-up work could not be queued.
    #[error("enqueue failed: {0}")]
    Enqueue(String),
}

/// Primary handler for one event type.
pub trait Listener<E>: Send + Sync {
    /// Stable listener name, used in logs and the routing table.
    fn name(&self) -> &'static str;

    fn handle(&self, event: &E) -> Result<(), ListenerError>;
}

/// Sees every domain event after its primary listener has run.
///
/// Observers cannot fail the dispatch.
pub trait EventObserver: Send + Sync {
    fn observe(&self, event: &DomainEvent);
}
