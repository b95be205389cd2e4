//! # pdftext-ocr
//!
//! Best-effort plain text from any PDF, typed or scanned.
//!
//! ## Why this crate?
//!
//! Many business PDFs are scans: their text layer is empty, or a handful of
//! stray glyphs. This crate detects that, rasterises the pages at 600 DPI,
//! reads them with Tesseract tuned for Vietnamese diacritics, and lets a
//! chat model repair what OCR got wrong. Every stage that can fail softly
//! does: a bad page yields no text, a bad model answer yields the OCR text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate the local file (%PDF magic)
//!  ├─ 2. Classify  is the text layer real text? if so, return it
//!  ├─ 3. Render    per-page → bulk → bulk auto-sized, via pdfium
//!  ├─ 4. OCR       tesseract per page; image deleted right after
//!  ├─ 5. Aggregate "--- Page N ---" before each non-empty page
//!  └─ 6. Correct   LLM spelling repair, rejected if empty or < 50 % length
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftext_ocr::{Extractor, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Correction provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let extractor = Extractor::new(ExtractionConfig::default())?;
//!     let text = extractor.extract_text("scan.pdf", 10).await?;
//!     println!("{}", text);
//!     extractor.cleanup();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftext` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdftext-ocr = { version = "0.3", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! - a pdfium shared library (`PDFIUM_LIB_PATH`, the working directory, or
//!   the system loader path)
//! - the `tesseract` executable with the `vie` and `eng` language data

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scratch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, Replacement, ReplacementTable};
pub use error::{CorrectionError, ExtractError, RecognitionError, RenderError};
pub use extract::{aggregate_pages, extract_text, is_scanned_pdf, Extractor};
pub use output::{
    ConversionAttempt, CorrectionOutcome, ExtractionOutput, ExtractionStats, PageText,
    RasterStrategy, TextOrigin,
};
pub use pipeline::correct::{Correction, CorrectionEngine, Corrector, LlmCorrector};
pub use pipeline::ocr::{RecognitionEngine, Recognizer, TesseractRecognizer};
pub use pipeline::render::{
    PageImage, PageRenderer, PdfiumRenderer, Rasterization, Rasterizer, RenderOptions,
};
pub use pipeline::textlayer::{PdfiumTextLayer, TextLayer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use scratch::{ScratchDir, WorkDir};
