//! Skill Matching — locates the first credible occurrence of a requested skill
//! in the lowercased token sequence, and decides what happens when there is none.
//!
//! Lookup order, first hit wins at each step:
//! 1. exact token equality
//! 2. skill contained in a token
//! 3. multi-word skills only: consecutive tokens equal to the skill's words

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a skill was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Substring,
    Phrase,
}

/// A hit anchored at `index` in the token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillMatch {
    pub index: usize,
    pub kind: MatchKind,
}

/// What to do with a skill that has no occurrence in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoMatchPolicy {
    /// Leave the skill out of the results entirely.
    #[default]
    Drop,
    /// Score the skill against the opening of the document with a low prior.
    Degrade,
}

impl NoMatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoMatchPolicy::Drop => "drop",
            NoMatchPolicy::Degrade => "degrade",
        }
    }
}

impl fmt::Display for NoMatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(NoMatchPolicy::Drop),
            "degrade" => Ok(NoMatchPolicy::Degrade),
            other => Err(format!(
                "unknown no-match policy '{other}' (expected drop or degrade)"
            )),
        }
    }
}

/// Finds `skill` in `lowered_tokens` (already lowercased).
pub fn find_skill(lowered_tokens: &[String], skill: &str) -> Option<SkillMatch> {
    let key = skill.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }

    if let Some(index) = lowered_tokens.iter().position(|t| *t == key) {
        return Some(SkillMatch {
            index,
            kind: MatchKind::Exact,
        });
    }

    if let Some(index) = lowered_tokens.iter().position(|t| t.contains(&key)) {
        return Some(SkillMatch {
            index,
            kind: MatchKind::Substring,
        });
    }

    let words: Vec<&str> = key.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    lowered_tokens
        .windows(words.len())
        .position(|window| window.iter().zip(&words).all(|(t, w)| t.as_str() == *w))
        .map(|index| SkillMatch {
            index,
            kind: MatchKind::Phrase,
        })
}
