use serde_json::Value as JsonValue;

use crate::result::{AnalysisResult, ProcessingError, Transcript};

/// Speech-to-text service.
pub trait Transcriber: Send + Sync + 'static {
    fn transcribe(&self, audio_url: &str) -> Result<Transcript, ProcessingError>;
}

/// What the analyzer gets to look at.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub answers: JsonValue,
    pub transcript: Option<String>,
}

/// AI analysis service.
///
/// Must not mutate domain state.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisResult, ProcessingError>;
}

/// Deterministic in-process backend for dev/test.
///
/// It does not understand audio; transcripts are placeholders. The analysis
/// scores answer completeness so downstream code has stable numbers to show.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcessor;

impl Transcriber for LocalProcessor {
    fn transcribe(&self, audio_url: &str) -> Result<Transcript, ProcessingError> {
        if !(audio_url.starts_with("https://") || audio_url.starts_with("http://")) {
            return Err(ProcessingError::InvalidInput(
                "audio url must be http(s)".to_string(),
            ));
        }
        Ok(Transcript {
            text: String::new(),
            language: None,
            duration_secs: None,
        })
    }
}

impl Analyzer for LocalProcessor {
    fn analyze(&self, input: &AnalysisInput) -> Result<AnalysisResult, ProcessingError> {
        let JsonValue::Object(answers) = &input.answers else {
            return Err(ProcessingError::InvalidInput(
                "answers must be an object".to_string(),
            ));
        };

        let total = answers.len();
        let answered = answers
            .values()
            .filter(|v| match v {
                JsonValue::Null => false,
                JsonValue::String(s) => !s.trim().is_empty(),
                _ => true,
            })
            .count();

        let score = if total == 0 {
            0.0
        } else {
            answered as f64 / total as f64
        };

        Ok(AnalysisResult::new(score, 0.5)
            .with_summary(format!("{answered} of {total} questions answered"))
            .with_metadata(serde_json::json!({
                "model": "local",
                "has_transcript": input.transcript.is_some(),
            })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_analysis_scores_completeness() {
        let input = AnalysisInput {
            answers: serde_json::json!({"q1": "yes", "q2": "", "q3": null, "q4": 3}),
            transcript: None,
        };
        let result = LocalProcessor.analyze(&input).unwrap();
        assert_eq!(result.score, 0.5);
        assert_eq!(result.summary.as_deref(), Some("2 of 4 questions answered"));
    }

    #[test]
    fn local_analysis_rejects_non_object_answers() {
        let input = AnalysisInput {
            answers: serde_json::json!([1, 2]),
            transcript: None,
        };
        assert!(matches!(
            LocalProcessor.analyze(&input),
            Err(ProcessingError::InvalidInput(_))
        ));
    }

    #[test]
    fn local_transcriber_requires_http_url() {
        assert!(LocalProcessor.transcribe("ftp://x/a.mp3").is_err());
        assert!(LocalProcessor.transcribe("https://cdn.example.com/a.mp3").is_ok());
    }
}
