//! Domain events and their listener pipeline.
//!
//! Events announce the completion of asynchronous work (a questionnaire
//! submitted, a transcription finished, an AI analysis finished). Each event
//! type has exactly one primary listener, declared in a static table; there
//! is no discovery at runtime.

pub mod development;
pub mod dispatcher;
pub mod event;
pub mod listener;

pub use development::DevelopmentEventLogger;
pub use dispatcher::{DispatchError, EventDispatcher, ListenerTable};
pub use event::{
    AiAnalysisCompleted, AudioTranscriptionCompleted, DomainEvent, Event,
    QuestionnaireResponseSubmitted, TenantScoped,
};
pub use listener::{EventObserver, Listener, ListenerError};
