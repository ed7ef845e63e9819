//! Section Classifier — maps a vertical position on a page to a coarse zone.
//!
//! Two footer thresholds have been used in practice (0.84 and 0.85). Both are
//! kept as named constants; the active one comes from configuration.

use serde::{Deserialize, Serialize};

use crate::analysis::models::Section;

/// Tokens whose top edge sits at or above this share of the page height are header.
pub const HEADER_RATIO: f64 = 0.18;
/// Footer threshold used by the integrity-scoring service.
pub const FOOTER_RATIO_INTEGRITY: f64 = 0.84;
/// Footer threshold used by the ranking prototype.
#[allow(dead_code)]
pub const FOOTER_RATIO_RANKING: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionThresholds {
    /// `ratio <= header_ratio` → header
    pub header_ratio: f64,
    /// `ratio >= footer_ratio` → footer
    pub footer_ratio: f64,
}

impl Default for SectionThresholds {
    fn default() -> Self {
        Self {
            header_ratio: HEADER_RATIO,
            footer_ratio: FOOTER_RATIO_INTEGRITY,
        }
    }
}

impl SectionThresholds {
    pub fn classify(&self, y0: f64, page_height: f64) -> Section {
        let ratio = y0 / page_height.max(1.0);
        if ratio <= self.header_ratio {
            Section::Header
        } else if ratio >= self.footer_ratio {
            Section::Footer
        } else {
            Section::Body
        }
    }
}
