//! Axum route handler for the Analysis API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use tracing::{debug, info};

use crate::analysis::models::AnalysisResult;
use crate::analysis::pipeline::analyze;
use crate::analysis::skills::parse_skill_list;
use crate::analysis::tokenizer::tokenize;
use crate::analysis::AnalysisError;
use crate::errors::AppError;
use crate::state::AppState;

/// Uploaded resume, as read off the multipart body.
struct ResumeUpload {
    filename: String,
    content: Bytes,
}

/// POST /api/v1/analyze
///
/// Multipart fields:
/// - `resume`: the PDF file (`.pdf` filename required)
/// - `job_skills`: comma-separated skills, optionally `Skill:importance`;
///   falls back to the configured default list when absent or blank
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let mut resume: Option<ResumeUpload> = None;
    let mut job_skills: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await?;
                resume = Some(ResumeUpload { filename, content });
            }
            "job_skills" => job_skills = Some(field.text().await?),
            other => debug!("Ignoring unexpected multipart field '{other}'"),
        }
    }

    let resume = resume
        .ok_or_else(|| AppError::Validation("Missing 'resume' file field.".to_string()))?;
    if !resume.filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation(
            "Only .pdf files are supported.".to_string(),
        ));
    }
    if resume.content.is_empty() {
        return Err(AppError::Validation("Uploaded PDF is empty.".to_string()));
    }

    let raw_skills = job_skills
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.config.default_required_skills.clone());
    let skills = parse_skill_list(&raw_skills)?;

    info!(
        "Analyzing '{}' ({} bytes) for {} skills",
        resume.filename,
        resume.content.len(),
        skills.len()
    );

    // Tokenizing is CPU-bound; keep it off the async workers.
    let content = resume.content;
    let document = tokio::task::spawn_blocking(move || tokenize(&content))
        .await
        .map_err(|e| AnalysisError::ParseFailure(format!("PDF extraction aborted: {e}")))??;

    let result = analyze(&document, &skills, &state.settings, &state.verifier).await?;
    Ok(Json(result))
}
