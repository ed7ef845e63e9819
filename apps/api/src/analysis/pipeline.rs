//! Analysis pipeline — one verification call from a parsed document and a
//! skill list to ranked, scored evidence.
//!
//! Per skill:
//! 1. locate the first occurrence (exact → substring → phrase)
//! 2. classify its zone from the vertical position on its page
//! 3. build the surrounding context window
//! 4. score semantic grounding of the skill in that window
//! 5. combine spatial weight and semantic score per the scoring policy
//!
//! Skills with no occurrence are dropped or degraded per the no-match policy.
//! Every evidence row then feeds the ranking engine.

use tracing::{debug, info};

use crate::analysis::confidence::{ScoringPolicy, SpatialWeights};
use crate::analysis::context_window::{context, DEFAULT_CONTEXT_RADIUS};
use crate::analysis::matching::{find_skill, NoMatchPolicy};
use crate::analysis::models::{
    clamp01, truncate_chars, AnalysisResult, ParsedDocument, RankingInput, Section, SkillEvidence,
};
use crate::analysis::ranking::rank;
use crate::analysis::sections::SectionThresholds;
use crate::analysis::semantic::SemanticVerifier;
use crate::analysis::skills::RequestedSkill;
use crate::analysis::AnalysisError;

/// Spatial weight given to evidence that is not anchored at a token.
pub const DEGRADED_SPATIAL_WEIGHT: f64 = 0.2;
/// Upper bound on the evidence snippet returned per skill, in characters.
pub const EVIDENCE_SNIPPET_CHARS: usize = 400;
/// Characters of context quoted in the reasoning text.
const REASONING_QUOTE_CHARS: usize = 150;
/// Default context when the document has no text at all.
const EMPTY_TEXT_PLACEHOLDER: &str = "(no text extracted)";

/// Tunables for one analysis call, built from configuration.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub context_radius: usize,
    pub thresholds: SectionThresholds,
    pub spatial_weights: SpatialWeights,
    pub scoring_policy: ScoringPolicy,
    pub no_match_policy: NoMatchPolicy,
    pub degraded_spatial_weight: f64,
    pub snippet_chars: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            context_radius: DEFAULT_CONTEXT_RADIUS,
            thresholds: SectionThresholds::default(),
            spatial_weights: SpatialWeights::default(),
            scoring_policy: ScoringPolicy::default(),
            no_match_policy: NoMatchPolicy::default(),
            degraded_spatial_weight: DEGRADED_SPATIAL_WEIGHT,
            snippet_chars: EVIDENCE_SNIPPET_CHARS,
        }
    }
}

/// Runs the pipeline over an already tokenized document.
pub async fn analyze(
    document: &ParsedDocument,
    skills: &[RequestedSkill],
    settings: &AnalysisSettings,
    verifier: &SemanticVerifier,
) -> Result<AnalysisResult, AnalysisError> {
    if skills.is_empty() {
        return Err(AnalysisError::NoSkillsRequested);
    }
    if document.tokens.is_empty() {
        return Err(AnalysisError::EmptyDocument);
    }

    let lowered: Vec<String> = document
        .tokens
        .iter()
        .map(|t| t.text().to_lowercase())
        .collect();

    let mut evidences = Vec::with_capacity(skills.len());
    let mut ranking_inputs = Vec::with_capacity(skills.len());

    for skill in skills {
        let evidence = match find_skill(&lowered, &skill.name) {
            Some(hit) => {
                debug!("Skill '{}' matched ({:?}) at token {}", skill.name, hit.kind, hit.index);
                anchored_evidence(document, &skill.name, hit.index, settings, verifier).await
            }
            None => match settings.no_match_policy {
                NoMatchPolicy::Drop => {
                    debug!("Skill '{}' not found; dropped", skill.name);
                    continue;
                }
                NoMatchPolicy::Degrade => {
                    debug!("Skill '{}' not found; degraded", skill.name);
                    degraded_evidence(document, &skill.name, settings, verifier).await
                }
            },
        };

        ranking_inputs.push(RankingInput::new(
            evidence.skill.clone(),
            skill.importance,
            evidence.confidence,
            evidence.spatial_weight,
        ));
        evidences.push(evidence);
    }

    let ranking = rank(ranking_inputs);
    let total_detected = evidences.iter().filter(|e| e.is_anchored()).count();

    info!(
        "Analysis complete: {} tokens, {} pages, {} skills requested, {} detected, total score {:.4}",
        document.tokens.len(),
        document.page_count(),
        skills.len(),
        total_detected,
        ranking.total_score
    );

    let capability = verifier.capability();
    Ok(AnalysisResult {
        extracted_skills: evidences,
        ranked_skills: ranking.ranked,
        total_score: ranking.total_score,
        total_detected,
        model: verifier.model_name().to_string(),
        semantic_backend: capability.active.to_string(),
        scoring_policy: settings.scoring_policy.to_string(),
        no_match_policy: settings.no_match_policy.to_string(),
        notes: capability.note.clone(),
    })
}

async fn anchored_evidence(
    document: &ParsedDocument,
    skill: &str,
    index: usize,
    settings: &AnalysisSettings,
    verifier: &SemanticVerifier,
) -> SkillEvidence {
    let coordinate = *document.tokens[index].coordinate();
    let (_, page_height) = document.page_size(coordinate.page);
    let section = settings.thresholds.classify(coordinate.y0, page_height);
    let window = context(&document.tokens, index, settings.context_radius);

    let semantic_similarity = verifier.similarity(skill, &window).await;
    let spatial_weight = clamp01(settings.spatial_weights.weight(section));
    let confidence = settings
        .scoring_policy
        .confidence(spatial_weight, semantic_similarity);

    SkillEvidence {
        skill: skill.to_string(),
        coordinates: Some(coordinate),
        semantic_similarity,
        spatial_weight,
        confidence,
        section,
        evidence_snippet: truncate_chars(&window, settings.snippet_chars).to_string(),
        reasoning: format!(
            "Found {skill} in '{section}' section; verified via semantic context: '{}...'",
            truncate_chars(&window, REASONING_QUOTE_CHARS)
        ),
    }
}

async fn degraded_evidence(
    document: &ParsedDocument,
    skill: &str,
    settings: &AnalysisSettings,
    verifier: &SemanticVerifier,
) -> SkillEvidence {
    let full_text = document.full_text();
    let default_context = match truncate_chars(&full_text, settings.snippet_chars) {
        "" => EMPTY_TEXT_PLACEHOLDER,
        head => head,
    };

    let semantic_similarity = verifier.similarity(skill, default_context).await;
    let spatial_weight = clamp01(settings.degraded_spatial_weight);
    let confidence = settings
        .scoring_policy
        .confidence(spatial_weight, semantic_similarity);

    SkillEvidence {
        skill: skill.to_string(),
        coordinates: None,
        semantic_similarity,
        spatial_weight,
        confidence,
        section: Section::Body,
        evidence_snippet: default_context.to_string(),
        reasoning: format!(
            "No direct occurrence of {skill}; scored against the document opening: '{}...'",
            truncate_chars(default_context, REASONING_QUOTE_CHARS)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::analysis::models::{Coordinate, SpatialToken};

    /// One-page document, every token at the given vertical position on a 100pt page.
    fn document_at(words: &[&str], y0: f64) -> ParsedDocument {
        let tokens = words
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                let x0 = i as f64 * 10.0;
                SpatialToken::new(
                    *w,
                    Coordinate {
                        x0,
                        y0,
                        x1: x0 + 8.0,
                        y1: y0 + 2.0,
                        page_width: 100.0,
                        page_height: 100.0,
                        page: 1,
                    },
                )
            })
            .collect();
        ParsedDocument {
            tokens,
            page_sizes: BTreeMap::from([(1, (100.0, 100.0))]),
        }
    }

    fn body_document() -> ParsedDocument {
        document_at(&["Experienced", "Python", "SQL", "Engineer"], 50.0)
    }

    fn skills(names: &[&str]) -> Vec<RequestedSkill> {
        names.iter().map(|n| RequestedSkill::new(*n)).collect()
    }

    fn settings(no_match_policy: NoMatchPolicy, scoring_policy: ScoringPolicy) -> AnalysisSettings {
        AnalysisSettings {
            no_match_policy,
            scoring_policy,
            ..AnalysisSettings::default()
        }
    }

    #[tokio::test]
    async fn test_drop_policy_keeps_only_matched_skills() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(
            &body_document(),
            &skills(&["Python", "Go"]),
            &settings(NoMatchPolicy::Drop, ScoringPolicy::Multiplicative),
            &verifier,
        )
        .await
        .unwrap();

        assert_eq!(result.extracted_skills.len(), 1);
        let python = &result.extracted_skills[0];
        assert_eq!(python.skill, "Python");
        assert_eq!(python.section, Section::Body);
        assert_eq!(python.spatial_weight, 0.75);
        assert_eq!(python.semantic_similarity, 1.0);
        assert!((python.confidence - 0.75).abs() < 1e-9);
        assert_eq!(python.coordinates.unwrap().x0, 10.0);
        assert_eq!(result.total_detected, 1);
        assert_eq!(result.ranked_skills.len(), 1);
    }

    #[tokio::test]
    async fn test_degrade_policy_synthesizes_low_weight_evidence() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(
            &body_document(),
            &skills(&["Python", "Go"]),
            &settings(NoMatchPolicy::Degrade, ScoringPolicy::Multiplicative),
            &verifier,
        )
        .await
        .unwrap();

        assert_eq!(result.extracted_skills.len(), 2);
        let go = &result.extracted_skills[1];
        assert_eq!(go.skill, "Go");
        assert!(go.coordinates.is_none());
        assert_eq!(go.section, Section::Body);
        assert_eq!(go.spatial_weight, DEGRADED_SPATIAL_WEIGHT);
        assert_eq!(go.evidence_snippet, "Experienced Python SQL Engineer");
        assert!(go.reasoning.starts_with("No direct occurrence of Go"));
        assert_eq!(result.total_detected, 1);
        assert_eq!(result.ranked_skills[0].skill, "Python");
        assert_eq!(result.ranked_skills[1].skill, "Go");
    }

    #[tokio::test]
    async fn test_weighted_sum_policy() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(
            &body_document(),
            &skills(&["Python"]),
            &settings(NoMatchPolicy::Drop, ScoringPolicy::WeightedSum),
            &verifier,
        )
        .await
        .unwrap();
        // 0.7 * 1.0 + 0.3 * 0.75
        assert!((result.extracted_skills[0].confidence - 0.925).abs() < 1e-9);
        assert_eq!(result.scoring_policy, "weighted-sum");
    }

    #[tokio::test]
    async fn test_header_and_footer_zones_use_their_weights() {
        let verifier = SemanticVerifier::lexical();
        let defaults = AnalysisSettings::default();

        let header = analyze(&document_at(&["Rust"], 5.0), &skills(&["Rust"]), &defaults, &verifier)
            .await
            .unwrap();
        assert_eq!(header.extracted_skills[0].section, Section::Header);
        assert_eq!(header.extracted_skills[0].spatial_weight, 1.0);

        let footer = analyze(&document_at(&["Rust"], 95.0), &skills(&["Rust"]), &defaults, &verifier)
            .await
            .unwrap();
        assert_eq!(footer.extracted_skills[0].section, Section::Footer);
        assert_eq!(footer.extracted_skills[0].spatial_weight, 0.35);
    }

    #[tokio::test]
    async fn test_total_score_is_sum_of_ranked_scores() {
        let verifier = SemanticVerifier::lexical();
        let skills = vec![
            RequestedSkill::with_importance("Python", 2.0),
            RequestedSkill::with_importance("SQL", 0.5),
            RequestedSkill::new("Go"),
        ];
        let result = analyze(
            &body_document(),
            &skills,
            &settings(NoMatchPolicy::Degrade, ScoringPolicy::WeightedSum),
            &verifier,
        )
        .await
        .unwrap();
        let sum: f64 = result.ranked_skills.iter().map(|r| r.weighted_score).sum();
        assert_eq!(result.total_score, sum);
        assert!(result
            .ranked_skills
            .windows(2)
            .all(|w| w[0].weighted_score >= w[1].weighted_score));
    }

    #[tokio::test]
    async fn test_all_scores_are_bounded() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(
            &body_document(),
            &skills(&["Python", "Engineer", "Kubernetes", "sql"]),
            &settings(NoMatchPolicy::Degrade, ScoringPolicy::Multiplicative),
            &verifier,
        )
        .await
        .unwrap();
        for e in &result.extracted_skills {
            assert!((0.0..=1.0).contains(&e.confidence));
            assert!((0.0..=1.0).contains(&e.semantic_similarity));
            assert!((0.0..=1.0).contains(&e.spatial_weight));
        }
    }

    #[tokio::test]
    async fn test_empty_document_is_rejected() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(
            &ParsedDocument::default(),
            &skills(&["Python"]),
            &AnalysisSettings::default(),
            &verifier,
        )
        .await;
        assert!(matches!(result, Err(AnalysisError::EmptyDocument)));
    }

    #[tokio::test]
    async fn test_no_skills_is_rejected() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(&body_document(), &[], &AnalysisSettings::default(), &verifier).await;
        assert!(matches!(result, Err(AnalysisError::NoSkillsRequested)));
    }

    #[tokio::test]
    async fn test_evidence_snippet_is_bounded() {
        let words: Vec<String> = (0..300).map(|i| format!("word{i}")).collect();
        let mut refs: Vec<&str> = words.iter().map(String::as_str).collect();
        refs.insert(150, "Rust");
        let doc = document_at(&refs, 50.0);
        let verifier = SemanticVerifier::lexical();
        let result = analyze(&doc, &skills(&["Rust"]), &AnalysisSettings::default(), &verifier)
            .await
            .unwrap();
        let evidence = &result.extracted_skills[0];
        assert!(evidence.evidence_snippet.chars().count() <= EVIDENCE_SNIPPET_CHARS);
        assert!(evidence.reasoning.starts_with("Found Rust in 'body' section"));
    }

    #[tokio::test]
    async fn test_result_reports_backend_and_policies() {
        let verifier = SemanticVerifier::lexical();
        let result = analyze(
            &body_document(),
            &skills(&["Python"]),
            &AnalysisSettings::default(),
            &verifier,
        )
        .await
        .unwrap();
        assert_eq!(result.semantic_backend, "lexical");
        assert_eq!(result.scoring_policy, "multiplicative");
        assert_eq!(result.no_match_policy, "drop");
        assert!(result.notes.is_none());
    }
}
