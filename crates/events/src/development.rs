//! Verbatim event mirror for local development.

use tracing::info;

use crate::event::{DomainEvent, Event};
use crate::listener::EventObserver;

/// Logs every domain event to the `reskill::development` target.
///
/// Only registered when the application runs in a local/development
/// environment; see `EventDispatcher::with_observer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevelopmentEventLogger;

impl EventObserver for DevelopmentEventLogger {
    fn observe(&self, event: &DomainEvent) {
        let metadata = event
            .metadata()
            .map(|m| m.to_string())
            .unwrap_or_default();
        info!(
            target: "reskill::development",
            event = event.class_name(),
            event_type = event.event_type(),
            response_id = %event.response_id(),
            metadata = %metadata,
            "domain event"
        );
    }
}
