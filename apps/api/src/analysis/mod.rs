// Skill verification pipeline.
// Tokenizer → {Section Classifier, Context Window} → Semantic Verifier → Confidence → Ranking.
// Data only flows forward; no stage calls back into an earlier one.

pub mod confidence;
pub mod context_window;
pub mod handlers;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod ranking;
pub mod sections;
pub mod semantic;
pub mod skills;
pub mod tokenizer;

use thiserror::Error;

/// Failures of a single analysis call. Backend unavailability is deliberately
/// absent: it downgrades the verifier instead of failing the call.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unable to parse PDF: {0}")]
    ParseFailure(String),

    #[error("No text detected in PDF. Please upload a text-based PDF.")]
    EmptyDocument,

    #[error("No skills provided for verification.")]
    NoSkillsRequested,

    #[error("Invalid skill entry: {0}")]
    InvalidSkill(String),
}
