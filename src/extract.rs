//! Top-level extraction entry points.
//!
//! [`Extractor`] sequences the pipeline:
//!
//! ```text
//! input ──▶ text layer ──▶ classify ──┬──▶ (typed) return direct text
//!                                     └──▶ (scanned) rasterise ──▶ OCR per page ──▶ aggregate ──▶ correct
//! ```
//!
//! Every backend sits behind a trait so the whole flow runs with test
//! doubles; [`Extractor::new`] wires the real ones (pdfium, tesseract, LLM).

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{
    CorrectionOutcome, ExtractionOutput, ExtractionStats, PageText, TextOrigin,
};
use crate::pipeline::classify;
use crate::pipeline::correct::{CorrectionEngine, Corrector};
use crate::pipeline::input;
use crate::pipeline::ocr::{RecognitionEngine, Recognizer, TesseractRecognizer};
use crate::pipeline::render::{PageImage, PageRenderer, PdfiumRenderer, Rasterization, Rasterizer};
use crate::pipeline::textlayer::{PdfiumTextLayer, TextLayer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::scratch::ScratchDir;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The extraction pipeline with its backends.
///
/// Cheap to share behind an `Arc`; every call allocates its own work
/// directory, so concurrent extractions do not interfere.
pub struct Extractor {
    config: ExtractionConfig,
    scratch: ScratchDir,
    text_layer: Arc<dyn TextLayer>,
    rasterizer: Rasterizer,
    recognition: RecognitionEngine,
    correction: CorrectionEngine,
    progress: ProgressCallback,
}

impl Extractor {
    /// Pipeline over pdfium, the `tesseract` executable and the configured
    /// LLM provider.
    ///
    /// # Errors
    /// - [`ExtractError::ScratchDir`] if the scratch directory cannot be created
    /// - [`ExtractError::ProviderNotConfigured`] if an explicitly named provider
    ///   cannot be built (an undetectable provider only disables correction)
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let correction = CorrectionEngine::from_config(&config)?;
        let recognizer = Arc::new(TesseractRecognizer::from_config(&config));
        Self::assemble(
            config,
            Arc::new(PdfiumTextLayer),
            Arc::new(PdfiumRenderer),
            recognizer,
            correction,
        )
    }

    /// Pipeline over caller-supplied backends.
    ///
    /// `corrector: None`, or `correction_enabled = false` in `config`,
    /// disables correction.
    pub fn with_backends(
        config: ExtractionConfig,
        text_layer: Arc<dyn TextLayer>,
        renderer: Arc<dyn PageRenderer>,
        recognizer: Arc<dyn Recognizer>,
        corrector: Option<Arc<dyn Corrector>>,
    ) -> Result<Self, ExtractError> {
        let corrector = corrector.filter(|_| config.correction_enabled);
        let correction = CorrectionEngine::new(corrector, &config);
        Self::assemble(config, text_layer, renderer, recognizer, correction)
    }

    fn assemble(
        config: ExtractionConfig,
        text_layer: Arc<dyn TextLayer>,
        renderer: Arc<dyn PageRenderer>,
        recognizer: Arc<dyn Recognizer>,
        correction: CorrectionEngine,
    ) -> Result<Self, ExtractError> {
        let scratch = ScratchDir::create(&config.scratch_dir)?;
        let progress = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback) as ProgressCallback);
        Ok(Self {
            rasterizer: Rasterizer::new(renderer, &config),
            recognition: RecognitionEngine::new(recognizer, &config),
            scratch,
            text_layer,
            correction,
            progress,
            config,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The scratch directory page images are written to.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Extract text from `path`, reading at most `max_pages` pages by OCR.
    ///
    /// Returns the text only; see [`Extractor::extract`] for diagnostics.
    ///
    /// # Errors
    /// Input errors, [`ExtractError::RasterizationFailed`] and
    /// [`ExtractError::NoImagesExtracted`]. OCR and correction failures are
    /// never errors; they degrade to less (or uncorrected) text.
    pub async fn extract_text(
        &self,
        path: impl AsRef<Path>,
        max_pages: usize,
    ) -> Result<String, ExtractError> {
        self.extract(path, max_pages).await.map(|out| out.text)
    }

    /// Extract text from `path` with full diagnostics.
    pub async fn extract(
        &self,
        path: impl AsRef<Path>,
        max_pages: usize,
    ) -> Result<ExtractionOutput, ExtractError> {
        let start = Instant::now();
        if max_pages == 0 {
            return Err(ExtractError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        let pdf_path = input::resolve_local(path.as_ref())?;
        info!("Extracting text from {}", pdf_path.display());

        // ── Step 1: Classify the text layer ──────────────────────────────
        let direct = self.direct_text(&pdf_path).await;
        if !classify::is_scanned(&direct) {
            info!(
                "Text layer is usable ({} chars); skipping OCR",
                direct.chars().count()
            );
            return Ok(ExtractionOutput {
                text: direct,
                origin: TextOrigin::Direct,
                raw_ocr_text: String::new(),
                pages: Vec::new(),
                attempts: Vec::new(),
                correction: CorrectionOutcome::NotAttempted,
                stats: ExtractionStats {
                    total_duration_ms: start.elapsed().as_millis() as u64,
                    ..Default::default()
                },
            });
        }
        info!("Document looks scanned; running OCR on up to {} pages", max_pages);

        // ── Step 2: Rasterise ────────────────────────────────────────────
        // Dropping `work` removes any page image still on disk, whichever
        // way this function returns.
        let work = self.scratch.work_dir()?;
        let render_start = Instant::now();
        let Rasterization { images, attempts } = self
            .rasterizer
            .rasterize(&pdf_path, max_pages, work.path())
            .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        if images.is_empty() {
            return Err(ExtractError::NoImagesExtracted { path: pdf_path });
        }
        let total = images.len();
        self.progress.on_extraction_start(total);

        // ── Step 3: Recognise, in page order ─────────────────────────────
        let ocr_start = Instant::now();
        let pages: Vec<PageText> = stream::iter(images)
            .map(|image| self.recognize_one(image, total))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
        drop(work);

        // ── Step 4: Aggregate ────────────────────────────────────────────
        let raw = aggregate_pages(&pages);
        let text_pages = pages.iter().filter(|p| !p.text.trim().is_empty()).count();
        info!(
            "OCR complete: {}/{} pages with text, {} chars",
            text_pages,
            total,
            raw.chars().count()
        );

        // ── Step 5: Correct ──────────────────────────────────────────────
        let correction_start = Instant::now();
        let (text, correction) = if raw.is_empty() {
            warn!("No page produced text; skipping correction");
            (String::new(), CorrectionOutcome::NotAttempted)
        } else {
            let c = self.correction.correct(&raw).await;
            (c.text, c.outcome)
        };
        let correction_duration_ms = correction_start.elapsed().as_millis() as u64;
        self.progress.on_correction_complete(&correction);
        self.progress.on_extraction_complete(total, text_pages);

        Ok(ExtractionOutput {
            text,
            origin: TextOrigin::Ocr,
            raw_ocr_text: raw,
            attempts,
            correction,
            stats: ExtractionStats {
                rendered_pages: total,
                text_pages,
                empty_pages: total - text_pages,
                total_duration_ms: start.elapsed().as_millis() as u64,
                render_duration_ms,
                ocr_duration_ms,
                correction_duration_ms,
            },
            pages,
        })
    }

    /// Whether the text layer of `path` looks scanned.
    pub async fn classify(&self, path: impl AsRef<Path>) -> Result<bool, ExtractError> {
        let pdf_path = input::resolve_local(path.as_ref())?;
        Ok(classify::is_scanned(&self.direct_text(&pdf_path).await))
    }

    /// Run the correction pass alone, e.g. on previously stored OCR text.
    pub async fn correct_text(&self, text: &str) -> String {
        let c = self.correction.correct(text).await;
        self.progress.on_correction_complete(&c.outcome);
        c.text
    }

    /// Delete everything in the scratch directory. Returns the number of
    /// entries removed.
    pub fn cleanup(&self) -> usize {
        self.scratch.cleanup()
    }

    async fn direct_text(&self, pdf_path: &Path) -> String {
        match self.text_layer.extract(pdf_path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Cannot read text layer, treating as scanned: {}", e);
                String::new()
            }
        }
    }

    async fn recognize_one(&self, image: PageImage, total: usize) -> PageText {
        let page_num = image.page_num();
        self.progress.on_page_start(page_num, total);
        let page = self.recognition.recognize_page(image).await;
        if page.text.is_empty() {
            debug!("Page {}/{}: no text", page_num, total);
            self.progress.on_page_empty(page_num, total);
        } else {
            self.progress
                .on_page_complete(page_num, total, page.text.chars().count());
        }
        page
    }
}

/// Join page texts with a `--- Page N ---` line before each non-empty page.
///
/// Empty pages are skipped but keep their number, so the delimiters show
/// which pages were read.
pub fn aggregate_pages(pages: &[PageText]) -> String {
    let mut out = String::new();
    for page in pages {
        let text = page.text.trim();
        if text.is_empty() {
            continue;
        }
        out.push_str(&format!("--- Page {} ---\n{}\n", page.page_num, text));
    }
    out
}

/// Whether already-extracted text looks like it came from a scanned document.
pub fn is_scanned_pdf(text: &str) -> bool {
    classify::is_scanned(text)
}

/// Extract text from `path` with the default backends and `config.max_pages`.
pub async fn extract_text(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<String, ExtractError> {
    Extractor::new(config.clone())?
        .extract_text(path, config.max_pages)
        .await
}
