//! Synchronous event dispatch over a closed routing table.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};

use crate::event::{
    AiAnalysisCompleted, AudioTranscriptionCompleted, DomainEvent, Event,
    QuestionnaireResponseSubmitted,
};
use crate::listener::{EventObserver, Listener, ListenerError};

/// The one primary listener for each event type.
///
/// Adding a `DomainEvent` variant without adding a field here fails to
/// compile in [`EventDispatcher::dispatch`].
#[derive(Clone)]
pub struct ListenerTable {
    pub questionnaire_response_submitted: Arc<dyn Listener<QuestionnaireResponseSubmitted>>,
    pub audio_transcription_completed: Arc<dyn Listener<AudioTranscriptionCompleted>>,
    pub ai_analysis_completed: Arc<dyn Listener<AiAnalysisCompleted>>,
}

impl ListenerTable {
    /// `(event type, listener name)` pairs, in declaration order.
    pub fn routes(&self) -> [(&'static str, &'static str); 3] {
        [
            (
                "questionnaire.response_submitted",
                self.questionnaire_response_submitted.name(),
            ),
            (
                "audio.transcription_completed",
                self.audio_transcription_completed.name(),
            ),
            ("ai.analysis_completed", self.ai_analysis_completed.name()),
        ]
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("listener {listener} failed for {event_type}: {source}")]
pub struct DispatchError {
    pub event_type: &'static str,
    pub listener: &'static str,
    #[source]
    pub source: ListenerError,
}

/// Delivers an event to observers in registration order, then to its
/// primary listener.
#[derive(Clone)]
pub struct EventDispatcher {
    table: ListenerTable,
    observers: Vec<Arc<dyn EventObserver>>,
}

impl EventDispatcher {
    pub fn new(table: ListenerTable) -> Self {
        Self {
            table,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn routes(&self) -> [(&'static str, &'static str); 3] {
        self.table.routes()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Run the event through its observers and listener.
    ///
    /// Observers see every event, including ones whose listener then fails.
    /// A listener failure is returned to the caller.
    pub fn dispatch(&self, event: &DomainEvent) -> Result<(), DispatchError> {
        for observer in &self.observers {
            observer.observe(event);
        }

        let (listener, result) = match event {
            DomainEvent::QuestionnaireResponseSubmitted(e) => {
                let l = &self.table.questionnaire_response_submitted;
                (l.name(), l.handle(e))
            }
            DomainEvent::AudioTranscriptionCompleted(e) => {
                let l = &self.table.audio_transcription_completed;
                (l.name(), l.handle(e))
            }
            DomainEvent::AiAnalysisCompleted(e) => {
                let l = &self.table.ai_analysis_completed;
                (l.name(), l.handle(e))
            }
        };

        if let Err(source) = result {
            error!(
                event_type = event.event_type(),
                listener,
                error = %source,
                "event listener failed"
            );
            return Err(DispatchError {
                event_type: event.event_type(),
                listener,
                source,
            });
        }
        debug!(event_type = event.event_type(), listener, "event handled");
        Ok(())
    }
}
