//! Context Window Builder — the span of token text surrounding a hit.

use crate::analysis::models::SpatialToken;

pub const DEFAULT_CONTEXT_RADIUS: usize = 50;

/// Space-joined text of `tokens[index - radius ..= index + radius]`, clipped at
/// both ends. An out-of-range `index` yields whatever part of the window still
/// overlaps the sequence (possibly nothing).
pub fn context(tokens: &[SpatialToken], index: usize, radius: usize) -> String {
    let start = index.saturating_sub(radius);
    let end = index
        .saturating_add(radius)
        .saturating_add(1)
        .min(tokens.len());
    if start >= end {
        return String::new();
    }
    tokens[start..end]
        .iter()
        .map(SpatialToken::text)
        .collect::<Vec<_>>()
        .join(" ")
}
