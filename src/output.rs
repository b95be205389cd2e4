//! Result types returned by an extraction.
//!
//! Nothing here is persisted by the library; every value describes one call
//! to [`crate::Extractor::extract`]. All types serialise to JSON for the
//! CLI's `--json` mode.

use serde::{Deserialize, Serialize};

/// Where the returned text came from.
///
/// Only OCR text goes through the correction pass; a real text layer is
/// returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOrigin {
    /// The PDF's embedded text layer.
    Direct,
    /// Concatenated per-page OCR output.
    Ocr,
}

/// Text recognised on one page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Cleaned OCR text; empty when recognition failed or the page is blank.
    pub text: String,
}

/// One rasterisation strategy, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterStrategy {
    /// One render call per page with fixed width.
    PerPage,
    /// All pages in one pass with fixed width.
    Bulk,
    /// All pages in one pass, sized by DPI alone.
    BulkAutoSize,
}

impl RasterStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RasterStrategy::PerPage => "per-page",
            RasterStrategy::Bulk => "bulk",
            RasterStrategy::BulkAutoSize => "bulk-no-fixed-dimensions",
        }
    }
}

/// Diagnostic record of one rasterisation strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionAttempt {
    pub strategy: RasterStrategy,
    /// Images kept from this attempt (after the page cap).
    pub pages: usize,
    /// Failure that moved the rasteriser to the next strategy.
    pub error: Option<String>,
}

impl ConversionAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What the correction pass did with its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    /// The model's text was accepted.
    Applied,
    /// Shorter than the minimum worth correcting; returned unchanged.
    SkippedShort,
    /// The model's text failed validation (empty or too short).
    Rejected(String),
    /// The model call failed; input returned unchanged.
    Failed(String),
    /// Correction is turned off or no provider is configured.
    Disabled,
    /// Nothing to correct: direct text, or OCR produced no text.
    NotAttempted,
}

impl CorrectionOutcome {
    /// True when the returned text came from the model.
    pub fn is_applied(&self) -> bool {
        matches!(self, CorrectionOutcome::Applied)
    }
}

/// Timing and count statistics for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Page images produced by the rasteriser.
    pub rendered_pages: usize,
    /// Pages that contributed text to the aggregate.
    pub text_pages: usize,
    /// Pages whose OCR produced no text.
    pub empty_pages: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub correction_duration_ms: u64,
}

/// Complete result of an extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Final text handed to the caller.
    pub text: String,
    pub origin: TextOrigin,
    /// Aggregated OCR text before correction (empty for direct text).
    pub raw_ocr_text: String,
    /// Per-page OCR results in page order (empty for direct text).
    pub pages: Vec<PageText>,
    /// Rasterisation strategies tried, in order.
    pub attempts: Vec<ConversionAttempt>,
    pub correction: CorrectionOutcome,
    pub stats: ExtractionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_labels() {
        assert_eq!(RasterStrategy::PerPage.as_str(), "per-page");
        assert_eq!(
            RasterStrategy::BulkAutoSize.as_str(),
            "bulk-no-fixed-dimensions"
        );
    }

    #[test]
    fn outcome_serialises_with_detail() {
        let json = serde_json::to_string(&CorrectionOutcome::Rejected("too short".into())).unwrap();
        assert_eq!(json, r#"{"kind":"rejected","detail":"too short"}"#);
        let json = serde_json::to_string(&CorrectionOutcome::Applied).unwrap();
        assert_eq!(json, r#"{"kind":"applied"}"#);
    }

    #[test]
    fn origin_is_snake_case() {
        assert_eq!(serde_json::to_string(&TextOrigin::Ocr).unwrap(), r#""ocr""#);
    }
}
