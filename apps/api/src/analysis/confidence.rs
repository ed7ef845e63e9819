//! Confidence Scorer — combines the zone prior (spatial weight) with the
//! semantic grounding score into one bounded trust value.
//!
//! Both combination policies are kept and selected by configuration:
//! - `Multiplicative`: `clamp01(spatial × semantic)`, NaN → 0.0
//! - `WeightedSum`:    `0.7 × semantic + 0.3 × spatial`

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::models::{clamp01, Section};

pub const HEADER_WEIGHT: f64 = 1.0;
pub const BODY_WEIGHT: f64 = 0.75;
/// Footer prior used with multiplicative scoring.
pub const FOOTER_WEIGHT_INTEGRITY: f64 = 0.35;
/// Footer prior used with weighted-sum ranking.
#[allow(dead_code)]
pub const FOOTER_WEIGHT_RANKING: f64 = 0.2;
/// Weight for a section with no entry in the table.
pub const UNMAPPED_WEIGHT: f64 = 0.5;

const SEMANTIC_COEFFICIENT: f64 = 0.7;
const SPATIAL_COEFFICIENT: f64 = 0.3;

// ────────────────────────────────────────────────────────────────────────────
// Spatial weights
// ────────────────────────────────────────────────────────────────────────────

/// Section → prior credibility weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialWeights {
    weights: HashMap<Section, f64>,
}

impl Default for SpatialWeights {
    fn default() -> Self {
        Self::from_entries([
            (Section::Header, HEADER_WEIGHT),
            (Section::Body, BODY_WEIGHT),
            (Section::Footer, FOOTER_WEIGHT_INTEGRITY),
        ])
    }
}

impl SpatialWeights {
    /// Builds a table from `(section, weight)` pairs; weights are clamped to [0, 1].
    pub fn from_entries(entries: impl IntoIterator<Item = (Section, f64)>) -> Self {
        Self {
            weights: entries
                .into_iter()
                .map(|(section, weight)| (section, clamp01(weight)))
                .collect(),
        }
    }

    /// Weight for `section`, or [`UNMAPPED_WEIGHT`] if the table has no entry.
    pub fn weight(&self, section: Section) -> f64 {
        self.weights
            .get(&section)
            .copied()
            .unwrap_or(UNMAPPED_WEIGHT)
    }

    /// Parses `header=1.0,body=0.75,footer=0.35`.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut entries = Vec::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (label, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected 'section=weight', got '{pair}'"))?;
            let section = Section::from_label(label)
                .ok_or_else(|| format!("unknown section '{}'", label.trim()))?;
            let weight: f64 = value
                .trim()
                .parse()
                .map_err(|_| format!("invalid weight '{}' for {section}", value.trim()))?;
            if !(0.0..=1.0).contains(&weight) {
                return Err(format!("weight for {section} must be within [0, 1], got {weight}"));
            }
            entries.push((section, weight));
        }
        Ok(Self::from_entries(entries))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring policy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringPolicy {
    #[default]
    Multiplicative,
    WeightedSum,
}

impl ScoringPolicy {
    pub fn confidence(&self, spatial_weight: f64, semantic_similarity: f64) -> f64 {
        match self {
            ScoringPolicy::Multiplicative => clamp01(spatial_weight * semantic_similarity),
            ScoringPolicy::WeightedSum => clamp01(
                SEMANTIC_COEFFICIENT * clamp01(semantic_similarity)
                    + SPATIAL_COEFFICIENT * clamp01(spatial_weight),
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringPolicy::Multiplicative => "multiplicative",
            ScoringPolicy::WeightedSum => "weighted-sum",
        }
    }
}

impl fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "multiplicative" => Ok(ScoringPolicy::Multiplicative),
            "weighted-sum" => Ok(ScoringPolicy::WeightedSum),
            other => Err(format!(
                "unknown scoring policy '{other}' (expected multiplicative or weighted-sum)"
            )),
        }
    }
}
