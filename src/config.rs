//! Configuration types for PDF text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct holds every knob so it can
//! be cloned into background tasks and logged as a unit.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Width of an A4 page rendered at 600 DPI.
pub const A4_WIDTH_AT_600_DPI: u32 = 2480;

/// Upper bound for [`ExtractionConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for a PDF text extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdftext_ocr::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_pages(5)
///     .ocr_language("vie+eng")
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum number of pages rasterised and recognised. Default: 10.
    pub max_pages: usize,

    /// Rendering DPI for page images, also passed to the OCR engine as a
    /// resolution hint. Default: 600.
    ///
    /// Vietnamese diacritics (dấu hỏi, dấu ngã, dấu nặng) are only a few
    /// pixels tall at 150 DPI; at 600 DPI Tesseract separates them from the
    /// base glyph reliably.
    pub dpi: u32,

    /// Fixed page width in pixels for the strict rasterisation strategies.
    /// Height follows the page aspect ratio. Default: 2480 (A4 at 600 DPI).
    pub target_width: u32,

    /// Tesseract language string. Default: "vie+eng".
    pub ocr_language: String,

    /// Path to the `tesseract` executable. Default: "tesseract" (resolved via PATH).
    pub tesseract_path: String,

    /// Minimum x-height (pixels) Tesseract accepts as text. Default: 20.
    ///
    /// Scaled for 600 DPI renders: the engine default of 10 lets speckle
    /// noise and detached diacritic marks be classified as separate words.
    pub min_xheight: u32,

    /// Per-page OCR timeout in seconds. Default: 120.
    pub ocr_timeout_secs: u64,

    /// Number of pages recognised concurrently. Default: 1 (sequential).
    ///
    /// Also the cap on page images being read at the same time.
    pub concurrency: usize,

    /// Run the language-model correction pass on OCR output. Default: true.
    pub correction_enabled: bool,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "gemini-2.0-flash".
    /// If None, uses "gpt-4.1-nano" for a named provider or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the correction call. Default: 0.1.
    ///
    /// Spelling repair must be faithful, not creative.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// The corrected text is roughly as long as the input; ten dense pages of
    /// Vietnamese need several thousand tokens.
    pub max_tokens: usize,

    /// Retry attempts on a failed correction call. Default: 2, at most
    /// [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call correction timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom correction prompt. If None, uses the built-in Vietnamese prompt.
    pub system_prompt: Option<String>,

    /// Literal find/replace pairs applied to every page after OCR.
    pub replacements: ReplacementTable,

    /// Directory holding page images while they are recognised.
    /// Default: `<system temp dir>/pdftext-ocr`.
    pub scratch_dir: PathBuf,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            dpi: 600,
            target_width: A4_WIDTH_AT_600_DPI,
            ocr_language: "vie+eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            min_xheight: 20,
            ocr_timeout_secs: 120,
            concurrency: 1,
            correction_enabled: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            replacements: ReplacementTable::default(),
            scratch_dir: default_scratch_dir(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_pages", &self.max_pages)
            .field("dpi", &self.dpi)
            .field("target_width", &self.target_width)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("min_xheight", &self.min_xheight)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("correction_enabled", &self.correction_enabled)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("replacements", &self.replacements.len())
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// `<system temp dir>/pdftext-ocr`
pub fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("pdftext-ocr")
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 1200);
        self
    }

    pub fn target_width(mut self, px: u32) -> Self {
        self.config.target_width = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn min_xheight(mut self, px: u32) -> Self {
        self.config.min_xheight = px;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn correction_enabled(mut self, v: bool) -> Self {
        self.config.correction_enabled = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn replacements(mut self, table: ReplacementTable) -> Self {
        self.config.replacements = table;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_pages must be ≥ 1".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.ocr_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Replacement table ────────────────────────────────────────────────────

/// Ordered literal find/replace pairs for strings OCR misreads consistently.
///
/// Applied in order after recognition. This is a fixed lookup for a closed
/// set of organisation names and headings, not a spell-checker; general
/// spelling repair belongs to the correction pass.
///
/// Serialises as a JSON array of `{"find": …, "replace": …}` objects so
/// deployments can extend it without a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplacementTable {
    rules: Vec<Replacement>,
}

/// One literal replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub find: String,
    pub replace: String,
}

impl Default for ReplacementTable {
    /// Headings that appear on nearly every Vietnamese administrative
    /// document and lose their diacritics under OCR.
    fn default() -> Self {
        Self::from_pairs([
            (
                "CONG HOA XA HOI CHU NGHIA VIET NAM",
                "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM",
            ),
            ("Doc lap - Tu do - Hanh phuc", "Độc lập - Tự do - Hạnh phúc"),
            ("CONG TY CO PHAN", "CÔNG TY CỔ PHẦN"),
            ("CÔNG TY CO PHAN", "CÔNG TY CỔ PHẦN"),
            ("Phong Hanh chinh - Nhan su", "Phòng Hành chính - Nhân sự"),
            ("Phòng Hanh chinh", "Phòng Hành chính"),
        ])
    }
}

impl ReplacementTable {
    /// A table with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build a table from `(find, replace)` pairs, preserving order.
    pub fn from_pairs<I, F, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (F, R)>,
        F: Into<String>,
        R: Into<String>,
    {
        Self {
            rules: pairs
                .into_iter()
                .map(|(f, r)| Replacement {
                    find: f.into(),
                    replace: r.into(),
                })
                .filter(|r| !r.find.is_empty())
                .collect(),
        }
    }

    /// Load a table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::InvalidConfig(format!(
                "cannot read replacement table {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a table from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, ExtractError> {
        let table: Self = serde_json::from_str(raw)
            .map_err(|e| ExtractError::InvalidConfig(format!("invalid replacement table: {e}")))?;
        if table.rules.iter().any(|r| r.find.is_empty()) {
            return Err(ExtractError::InvalidConfig(
                "replacement table contains an empty 'find' string".into(),
            ));
        }
        Ok(table)
    }

    /// Add a rule at the end of the table.
    pub fn push(&mut self, find: impl Into<String>, replace: impl Into<String>) {
        let find = find.into();
        if !find.is_empty() {
            self.rules.push(Replacement {
                find,
                replace: replace.into(),
            });
        }
    }

    /// Append every rule of `other` after this table's rules.
    pub fn extend(&mut self, other: ReplacementTable) {
        self.rules.extend(other.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            if out.contains(rule.find.as_str()) {
                out = out.replace(rule.find.as_str(), &rule.replace);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_600_dpi_pipeline() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_pages, 10);
        assert_eq!(c.dpi, 600);
        assert_eq!(c.target_width, 2480);
        assert_eq!(c.ocr_language, "vie+eng");
        assert_eq!(c.concurrency, 1);
        assert!(c.correction_enabled);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ExtractionConfig::builder()
            .concurrency(0)
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);

        let c = ExtractionConfig::builder().max_retries(u32::MAX).build().unwrap();
        assert_eq!(c.max_retries, MAX_RETRIES);

        let err = ExtractionConfig::builder().max_pages(0).build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));

        let err = ExtractionConfig::builder().ocr_language("  ").build();
        assert!(matches!(err, Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn replacement_table_applies_in_order() {
        let table = ReplacementTable::from_pairs([("ab", "x"), ("xc", "done")]);
        assert_eq!(table.apply("abc abc"), "done done");
    }

    #[test]
    fn default_table_restores_national_motto() {
        let table = ReplacementTable::default();
        let fixed = table.apply("Doc lap - Tu do - Hanh phuc\nnội dung");
        assert!(fixed.starts_with("Độc lập - Tự do - Hạnh phúc"));
        assert!(fixed.ends_with("nội dung"));
    }

    #[test]
    fn replacement_table_from_json() {
        let table =
            ReplacementTable::from_json(r#"[{"find": "ACME Cörp", "replace": "ACME Corp"}]"#)
                .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.apply("by ACME Cörp."), "by ACME Corp.");

        assert!(ReplacementTable::from_json(r#"[{"find": "", "replace": "x"}]"#).is_err());
        assert!(ReplacementTable::from_json("{").is_err());
    }

    #[test]
    fn extended_table_runs_builtin_rules_first() {
        let mut table = ReplacementTable::from_pairs([("CONG TY", "CÔNG TY")]);
        table.extend(ReplacementTable::from_pairs([("CÔNG TY ABC", "CÔNG TY TNHH ABC")]));
        assert_eq!(table.len(), 2);
        assert_eq!(table.apply("CONG TY ABC"), "CÔNG TY TNHH ABC");
    }

    #[test]
    fn empty_find_is_ignored() {
        let mut table = ReplacementTable::empty();
        table.push("", "boom");
        assert!(table.is_empty());
        assert_eq!(table.apply("text"), "text");
    }
}
