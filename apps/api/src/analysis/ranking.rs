//! Ranking Engine — orders verified skills by `importance × confidence × spatial_weight`
//! and reports their sum as the total score.

use std::cmp::Ordering;

use serde::Serialize;

use crate::analysis::models::{RankedSkill, RankingInput};

/// Sorted ranking plus its total. The total is only ever produced here, from
/// the returned list, so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub ranked: Vec<RankedSkill>,
    pub total_score: f64,
}

/// Ranks `entries` descending by weighted score. Ties keep input order.
pub fn rank(entries: Vec<RankingInput>) -> Ranking {
    let mut ranked: Vec<RankedSkill> = entries
        .into_iter()
        .map(|item| RankedSkill {
            weighted_score: item.importance * item.confidence * item.spatial_weight,
            skill: item.skill,
            importance: item.importance,
            confidence: item.confidence,
            spatial_weight: item.spatial_weight,
        })
        .collect();

    // sort_by is stable; numerically equal scores (0.0 == -0.0) compare Equal
    ranked.sort_by(|a, b| {
        b.weighted_score
            .partial_cmp(&a.weighted_score)
            .unwrap_or(Ordering::Equal)
    });

    let total_score = ranked.iter().map(|r| r.weighted_score).sum();

    Ranking {
        ranked,
        total_score,
    }
}
