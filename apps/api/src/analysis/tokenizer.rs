//! Document Tokenizer — PDF bytes → positioned words plus page dimensions.
//!
//! Uses `pdf-extract`'s `OutputDev` hook to receive every rendered glyph with
//! its text-rendering matrix. Glyphs are grouped into words by
//! [`WordCollector`]; a word ends at whitespace, at a line end, or where the
//! next glyph jumps away from the current one.
//!
//! CPU-bound: callers on the async runtime must go through `spawn_blocking`.

use std::collections::BTreeMap;

use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use tracing::debug;

use crate::analysis::models::{Coordinate, ParsedDocument, SpatialToken};
use crate::analysis::AnalysisError;

/// Horizontal gap (in font sizes) beyond which two glyphs belong to different words.
const WORD_GAP_RATIO: f64 = 0.25;
/// Baseline shift (in font sizes) that starts a new word.
const BASELINE_SHIFT_RATIO: f64 = 0.5;

/// Parses `bytes` into a [`ParsedDocument`]. A readable PDF with no text is a
/// valid, empty result; only structurally broken input is an error.
pub fn tokenize(bytes: &[u8]) -> Result<ParsedDocument, AnalysisError> {
    let doc = pdf_extract::Document::load_mem(bytes)
        .map_err(|e| AnalysisError::ParseFailure(e.to_string()))?;

    let mut collector = WordCollector::default();
    pdf_extract::output_doc(&doc, &mut collector)
        .map_err(|e| AnalysisError::ParseFailure(format!("{e:?}")))?;

    let parsed = collector.finish();
    debug!(
        "Tokenized PDF: {} pages, {} tokens",
        parsed.page_count(),
        parsed.tokens.len()
    );
    Ok(parsed)
}

// ────────────────────────────────────────────────────────────────────────────
// Glyph → word grouping
// ────────────────────────────────────────────────────────────────────────────

/// One rendered glyph in top-left page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub x: f64,
    /// Baseline, measured from the top of the page.
    pub baseline: f64,
    pub advance: f64,
    pub size: f64,
}

#[derive(Debug, Default)]
struct PendingWord {
    text: String,
    x0: f64,
    x1: f64,
    top: f64,
    bottom: f64,
    baseline: f64,
    size: f64,
}

/// Accumulates glyphs into [`SpatialToken`]s page by page.
#[derive(Debug, Default)]
pub struct WordCollector {
    tokens: Vec<SpatialToken>,
    page_sizes: BTreeMap<u32, (f64, f64)>,
    page: u32,
    /// Left edge and top edge of the current page's media box in PDF space.
    origin: (f64, f64),
    page_width: f64,
    page_height: f64,
    word: Option<PendingWord>,
}

impl WordCollector {
    /// Starts `page` (1-based). Zero, negative or non-finite dimensions are
    /// replaced by `(1.0, 1.0)`.
    pub fn start_page(&mut self, page: u32, width: f64, height: f64) {
        self.flush_word();
        let valid = |v: f64| v.is_finite() && v > 0.0;
        let (width, height) = if valid(width) && valid(height) {
            (width, height)
        } else {
            (1.0, 1.0)
        };
        self.page = page;
        self.page_width = width;
        self.page_height = height;
        self.page_sizes.insert(page, (width, height));
    }

    pub fn push_glyph(&mut self, glyph: Glyph, ch: &str) {
        if ch.chars().all(char::is_whitespace) {
            self.flush_word();
            return;
        }

        let continues = self.word.as_ref().is_some_and(|w| {
            let tolerance = w.size.max(glyph.size).max(1.0);
            let gap = glyph.x - w.x1;
            gap <= WORD_GAP_RATIO * tolerance
                && gap >= -tolerance
                && (glyph.baseline - w.baseline).abs() <= BASELINE_SHIFT_RATIO * tolerance
        });
        if !continues {
            self.flush_word();
        }

        let top = glyph.baseline - glyph.size;
        let right = glyph.x + glyph.advance.max(0.0);
        match self.word.as_mut() {
            Some(w) => {
                w.text.push_str(ch);
                w.x1 = w.x1.max(right);
                w.top = w.top.min(top);
                w.bottom = w.bottom.max(glyph.baseline);
                w.size = w.size.max(glyph.size);
            }
            None => {
                self.word = Some(PendingWord {
                    text: ch.to_string(),
                    x0: glyph.x,
                    x1: right,
                    top,
                    bottom: glyph.baseline,
                    baseline: glyph.baseline,
                    size: glyph.size,
                });
            }
        }
    }

    pub fn flush_word(&mut self) {
        let Some(word) = self.word.take() else {
            return;
        };
        let coordinate = Coordinate {
            x0: word.x0.max(0.0),
            y0: word.top.max(0.0),
            x1: word.x1.max(0.0),
            y1: word.bottom.max(0.0),
            page_width: self.page_width,
            page_height: self.page_height,
            page: self.page,
        };
        if let Some(token) = SpatialToken::new(word.text, coordinate) {
            self.tokens.push(token);
        }
    }

    pub fn finish(mut self) -> ParsedDocument {
        self.flush_word();
        ParsedDocument {
            tokens: self.tokens,
            page_sizes: self.page_sizes,
        }
    }
}

impl OutputDev for WordCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.origin = (media_box.llx, media_box.ury);
        self.start_page(
            page_num,
            media_box.urx - media_box.llx,
            media_box.ury - media_box.lly,
        );
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.flush_word();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        // Effective glyph size after the text matrix scaling.
        let sx = font_size * (trm.m11 + trm.m21);
        let sy = font_size * (trm.m12 + trm.m22);
        let size = (sx * sy).abs().sqrt();
        let glyph = Glyph {
            x: trm.m31 - self.origin.0,
            baseline: self.origin.1 - trm.m32,
            advance: width * size,
            size,
        };
        self.push_glyph(glyph, char);
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        self.flush_word();
        Ok(())
    }
}
