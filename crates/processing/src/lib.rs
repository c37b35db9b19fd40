//! `reskill-processing`: seams to the transcription and AI analysis services.
//!
//! Results produced here are insights, not domain state. Infra stores them and
//! announces completion through domain events.

pub mod backend;
pub mod result;

pub use backend::{AnalysisInput, Analyzer, LocalProcessor, Transcriber};
pub use result::{AnalysisResult, ProcessingError, Transcript};
