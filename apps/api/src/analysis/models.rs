//! Data model shared by every stage of the verification pipeline.
//!
//! Everything here is created fresh for a single analysis call and dropped once
//! the response has been serialized. Nothing carries identity across calls.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Document geometry
// ────────────────────────────────────────────────────────────────────────────

/// Bounding box of one token plus the geometry of the page it sits on.
/// `y0`/`y1` are measured from the top of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub page_width: f64,
    pub page_height: f64,
    /// 1-based page number.
    pub page: u32,
}

/// A word together with its bounding box and source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialToken {
    text: String,
    coordinate: Coordinate,
}

impl SpatialToken {
    /// Returns `None` when `text` is empty or whitespace-only.
    pub fn new(text: impl Into<String>, coordinate: Coordinate) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            coordinate,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }
}

/// Tokenizer output: tokens in page order (then intra-page extraction order)
/// and the `(width, height)` of every page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub tokens: Vec<SpatialToken>,
    pub page_sizes: BTreeMap<u32, (f64, f64)>,
}

impl ParsedDocument {
    /// Space-joined token texts.
    pub fn full_text(&self) -> String {
        self.tokens
            .iter()
            .map(SpatialToken::text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Page size for `page`, `(1.0, 1.0)` when the page was never recorded.
    pub fn page_size(&self, page: u32) -> (f64, f64) {
        self.page_sizes.get(&page).copied().unwrap_or((1.0, 1.0))
    }

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Zones
// ────────────────────────────────────────────────────────────────────────────

/// Coarse vertical page region a token falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    Body,
    Footer,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Body => "body",
            Section::Footer => "footer",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "header" => Some(Section::Header),
            "body" => Some(Section::Body),
            "footer" => Some(Section::Footer),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-skill evidence and ranking
// ────────────────────────────────────────────────────────────────────────────

/// Verification outcome for one requested skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEvidence {
    pub skill: String,
    /// `None` for degraded evidence that is not anchored at a token.
    pub coordinates: Option<Coordinate>,
    pub semantic_similarity: f64,
    pub spatial_weight: f64,
    pub confidence: f64,
    pub section: Section,
    pub evidence_snippet: String,
    pub reasoning: String,
}

impl SkillEvidence {
    pub fn is_anchored(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// One row fed to the ranking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingInput {
    pub skill: String,
    pub importance: f64,
    pub confidence: f64,
    pub spatial_weight: f64,
}

impl RankingInput {
    /// Clamps every field into its declared range; NaN becomes 0.0.
    pub fn new(skill: impl Into<String>, importance: f64, confidence: f64, spatial_weight: f64) -> Self {
        let importance = if importance.is_nan() {
            0.0
        } else {
            importance.max(0.0) + 0.0
        };
        Self {
            skill: skill.into(),
            importance,
            confidence: clamp01(confidence),
            spatial_weight: clamp01(spatial_weight),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSkill {
    pub skill: String,
    pub importance: f64,
    pub confidence: f64,
    pub spatial_weight: f64,
    /// importance × confidence × spatial_weight
    pub weighted_score: f64,
}

/// Response body of one analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub extracted_skills: Vec<SkillEvidence>,
    pub ranked_skills: Vec<RankedSkill>,
    /// Always the sum of `ranked_skills[*].weighted_score`.
    pub total_score: f64,
    pub total_detected: usize,
    pub model: String,
    pub semantic_backend: String,
    pub scoring_policy: String,
    pub no_match_policy: String,
    pub notes: Option<String>,
}

/// Clamps into `[0, 1]`, mapping NaN to 0.0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        // `+ 0.0` folds -0.0 into +0.0
        value.clamp(0.0, 1.0) + 0.0
    }
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(page: u32) -> Coordinate {
        Coordinate {
            x0: 0.0,
            y0: 10.0,
            x1: 20.0,
            y1: 22.0,
            page_width: 612.0,
            page_height: 792.0,
            page,
        }
    }

    #[test]
    fn test_spatial_token_rejects_blank_text() {
        assert!(SpatialToken::new("", coord(1)).is_none());
        assert!(SpatialToken::new("  \t ", coord(1)).is_none());
        let token = SpatialToken::new(" Rust ", coord(1)).unwrap();
        assert_eq!(token.text(), "Rust");
    }

    #[test]
    fn test_full_text_is_space_joined() {
        let doc = ParsedDocument {
            tokens: vec![
                SpatialToken::new("Senior", coord(1)).unwrap(),
                SpatialToken::new("Engineer", coord(1)).unwrap(),
            ],
            page_sizes: BTreeMap::from([(1, (612.0, 792.0))]),
        };
        assert_eq!(doc.full_text(), "Senior Engineer");
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_page_size_defaults_to_unit() {
        let doc = ParsedDocument::default();
        assert_eq!(doc.page_size(3), (1.0, 1.0));
    }

    #[test]
    fn test_section_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Section::Footer).unwrap(), "\"footer\"");
        assert_eq!(Section::from_label(" Header "), Some(Section::Header));
        assert_eq!(Section::from_label("sidebar"), None);
    }

    #[test]
    fn test_signed_zero_is_normalised() {
        assert!(clamp01(-0.0).is_sign_positive());
        let input = RankingInput::new("Go", -0.0, -0.0, 1.0);
        assert!(input.importance.is_sign_positive());
        assert!(input.confidence.is_sign_positive());
    }

    #[test]
    fn test_ranking_input_clamps_fields() {
        let input = RankingInput::new("Go", -2.0, 1.7, f64::NAN);
        assert_eq!(input.importance, 0.0);
        assert_eq!(input.confidence, 1.0);
        assert_eq!(input.spatial_weight, 0.0);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
