use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Text recognized from a respondent's audio answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Result of an AI analysis of one questionnaire response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Primary score for the analysis (model-specific meaning).
    pub score: f64,

    /// Confidence in \[0, 1\] (recommended convention; not enforced).
    pub confidence: f64,

    pub summary: Option<String>,

    /// Free-form metadata (model name, timings, etc).
    pub metadata: JsonValue,
}

impl AnalysisResult {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score,
            confidence,
            summary: None,
            metadata: JsonValue::Null,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("processing failed: {0}")]
    Failed(String),
}
