//! Requested-skill parsing: `"Python:2, SQL, React"` → named skills with importance.

use std::collections::HashSet;

use serde::Serialize;

use crate::analysis::AnalysisError;

pub const DEFAULT_IMPORTANCE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestedSkill {
    pub name: String,
    pub importance: f64,
}

impl RequestedSkill {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            importance: DEFAULT_IMPORTANCE,
        }
    }

    pub fn with_importance(name: impl Into<String>, importance: f64) -> Self {
        Self {
            name: name.into(),
            importance,
        }
    }
}

/// Splits a comma-separated list, trims entries, drops blanks and
/// case-insensitive duplicates (first occurrence wins).
///
/// An entry may end in `:<importance>`; importance must be finite and ≥ 0.
pub fn parse_skill_list(raw: &str) -> Result<Vec<RequestedSkill>, AnalysisError> {
    let mut seen = HashSet::new();
    let mut skills = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let skill = parse_entry(entry)?;
        if seen.insert(skill.name.to_lowercase()) {
            skills.push(skill);
        }
    }

    if skills.is_empty() {
        return Err(AnalysisError::NoSkillsRequested);
    }
    Ok(skills)
}

fn parse_entry(entry: &str) -> Result<RequestedSkill, AnalysisError> {
    let Some((name, weight)) = entry.rsplit_once(':') else {
        return Ok(RequestedSkill::new(entry));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(AnalysisError::InvalidSkill(format!(
            "'{entry}' has an importance but no skill name"
        )));
    }

    let importance: f64 = weight.trim().parse().map_err(|_| {
        AnalysisError::InvalidSkill(format!("'{entry}' has an unparsable importance"))
    })?;
    if !importance.is_finite() || importance < 0.0 {
        return Err(AnalysisError::InvalidSkill(format!(
            "importance for '{name}' must be a finite number ≥ 0"
        )));
    }

    Ok(RequestedSkill::with_importance(name, importance + 0.0))
}
