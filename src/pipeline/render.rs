//! PDF rasterisation: render pages to PNG files for OCR.
//!
//! ## Three strategies
//!
//! Fixed-width 600 DPI renders give Tesseract the best chance at small
//! diacritics, but some malformed or oddly shaped PDFs refuse forced
//! dimensions. [`Rasterizer`] therefore tries, in order:
//!
//! 1. **Per-page**: one render call per page at the fixed width. A page that
//!    does not exist ends the document. An error on page 1 moves on to
//!    strategy 2; an error on a later page keeps the pages already rendered.
//! 2. **Bulk**: every page in one pass at the fixed width, capped at
//!    `max_pages`.
//! 3. **Bulk, auto-sized**: every page in one pass scaled by DPI alone,
//!    capped at `max_pages`.
//!
//! When all three fail the last error is reported.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is CPU-bound and not async-safe; [`PdfiumRenderer`] moves each
//! call onto Tokio's blocking pool so worker threads never stall.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, RenderError};
use crate::output::{ConversionAttempt, RasterStrategy};
use crate::pipeline::pdfium;
use async_trait::async_trait;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Page images ──────────────────────────────────────────────────────────

/// A rendered page on disk.
///
/// The image owns its file: [`PageImage::discard`] deletes it, and dropping
/// an undiscarded image deletes it too, so no path through the pipeline
/// (errors and cancelled futures included) leaves a page image behind.
#[derive(Debug)]
pub struct PageImage {
    path: PathBuf,
    page_num: usize,
    width: u32,
    height: u32,
    deleted: bool,
}

impl PageImage {
    /// Take ownership of an image file for page `page_num` (1-indexed).
    pub fn new(path: PathBuf, page_num: usize, width: u32, height: u32) -> Self {
        Self {
            path,
            page_num,
            width,
            height,
            deleted: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Delete the image file now.
    pub fn discard(mut self) {
        self.remove_file();
    }

    fn remove_file(&mut self) {
        if self.deleted {
            return;
        }
        self.deleted = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Deleted page image {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot delete page image {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for PageImage {
    fn drop(&mut self) {
        self.remove_file();
    }
}

// ── Render options ───────────────────────────────────────────────────────

/// Sizing for one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub dpi: u32,
    /// Fixed output width; height follows the aspect ratio. `None` scales by DPI.
    pub target_width: Option<u32>,
}

impl RenderOptions {
    /// Fixed width at the configured DPI.
    pub fn strict(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            target_width: Some(config.target_width),
        }
    }

    /// No fixed dimensions; the page's own size times DPI.
    pub fn auto_size(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            target_width: None,
        }
    }

    fn pdfium_config(&self) -> PdfRenderConfig {
        match self.target_width {
            Some(width) => PdfRenderConfig::new().set_target_width(width as i32),
            None => PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / 72.0),
        }
    }
}

// ── Backend seam ─────────────────────────────────────────────────────────

/// A rasterisation backend.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render page `page_num` (1-indexed) into `out_dir`.
    ///
    /// `Ok(None)` means the page does not exist.
    async fn render_page(
        &self,
        pdf_path: &Path,
        page_num: usize,
        options: &RenderOptions,
        out_dir: &Path,
    ) -> Result<Option<PageImage>, RenderError>;

    /// Render every page into `out_dir`, in page order.
    async fn render_all(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, RenderError>;
}

/// Rasterisation through pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRenderer;

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    async fn render_page(
        &self,
        pdf_path: &Path,
        page_num: usize,
        options: &RenderOptions,
        out_dir: &Path,
    ) -> Result<Option<PageImage>, RenderError> {
        let path = pdf_path.to_path_buf();
        let dir = out_dir.to_path_buf();
        let options = *options;
        tokio::task::spawn_blocking(move || render_page_blocking(&path, page_num, &options, &dir))
            .await
            .map_err(|e| RenderError::Task(format!("Render task panicked: {}", e)))?
    }

    async fn render_all(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, RenderError> {
        let path = pdf_path.to_path_buf();
        let dir = out_dir.to_path_buf();
        let options = *options;
        tokio::task::spawn_blocking(move || render_all_blocking(&path, &options, &dir))
            .await
            .map_err(|e| RenderError::Task(format!("Render task panicked: {}", e)))?
    }
}

/// Blocking implementation of a single-page render.
fn render_page_blocking(
    pdf_path: &Path,
    page_num: usize,
    options: &RenderOptions,
    out_dir: &Path,
) -> Result<Option<PageImage>, RenderError> {
    let pdfium = pdfium::bind()?;
    let document = pdfium::open(&pdfium, pdf_path)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    if page_num == 0 || page_num > total_pages {
        return Ok(None);
    }

    let page = pages
        .get((page_num - 1) as u16)
        .map_err(|e| RenderError::Page {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    render_to_file(&page, page_num, options, out_dir).map(Some)
}

/// Blocking implementation of a whole-document render.
fn render_all_blocking(
    pdf_path: &Path,
    options: &RenderOptions,
    out_dir: &Path,
) -> Result<Vec<PageImage>, RenderError> {
    let pdfium = pdfium::bind()?;
    let document = pdfium::open(&pdfium, pdf_path)?;
    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    // Images rendered before a failure are dropped with `results`, which
    // deletes their files.
    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        results.push(render_to_file(&page, idx + 1, options, out_dir)?);
    }
    Ok(results)
}

fn render_to_file(
    page: &PdfPage<'_>,
    page_num: usize,
    options: &RenderOptions,
    out_dir: &Path,
) -> Result<PageImage, RenderError> {
    let bitmap = page
        .render_with_config(&options.pdfium_config())
        .map_err(|e| RenderError::Page {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    let path = out_dir.join(format!("page-{:04}.png", page_num));
    write_png(&image, &path)?;
    debug!(
        "Rendered page {} → {}x{} px ({})",
        page_num,
        image.width(),
        image.height(),
        path.display()
    );

    Ok(PageImage::new(path, page_num, image.width(), image.height()))
}

/// Lossless PNG at maximum compression.
fn write_png(image: &DynamicImage, path: &Path) -> Result<(), RenderError> {
    let write_err = |detail: String| RenderError::Write {
        path: path.to_path_buf(),
        detail,
    };
    let file = std::fs::File::create(path).map_err(|e| write_err(e.to_string()))?;
    let encoder = PngEncoder::new_with_quality(
        BufWriter::new(file),
        CompressionType::Best,
        FilterType::Adaptive,
    );
    image
        .write_with_encoder(encoder)
        .map_err(|e| write_err(e.to_string()))
}

// ── Three-strategy rasteriser ────────────────────────────────────────────

/// Page images plus the record of which strategies were tried.
#[derive(Debug)]
pub struct Rasterization {
    /// Rendered pages in page order, at most `max_pages`.
    pub images: Vec<PageImage>,
    pub attempts: Vec<ConversionAttempt>,
}

/// Converts a PDF into page images with the three-strategy fallback.
pub struct Rasterizer {
    renderer: Arc<dyn PageRenderer>,
    strict: RenderOptions,
    auto_size: RenderOptions,
}

impl Rasterizer {
    pub fn new(renderer: Arc<dyn PageRenderer>, config: &ExtractionConfig) -> Self {
        Self {
            renderer,
            strict: RenderOptions::strict(config),
            auto_size: RenderOptions::auto_size(config),
        }
    }

    /// Render up to `max_pages` pages of `pdf_path` into `out_dir`.
    ///
    /// Returns an empty image list if a strategy succeeded without output;
    /// the caller decides whether that is fatal.
    pub async fn rasterize(
        &self,
        pdf_path: &Path,
        max_pages: usize,
        out_dir: &Path,
    ) -> Result<Rasterization, ExtractError> {
        let mut attempts = Vec::with_capacity(3);

        let mut last_err = match self.render_per_page(pdf_path, max_pages, out_dir).await {
            Ok(images) => {
                info!("Per-page conversion produced {} pages", images.len());
                attempts.push(ConversionAttempt {
                    strategy: RasterStrategy::PerPage,
                    pages: images.len(),
                    error: None,
                });
                return Ok(Rasterization { images, attempts });
            }
            Err(e) => {
                warn!("Per-page conversion failed on page 1, trying bulk: {}", e);
                attempts.push(ConversionAttempt {
                    strategy: RasterStrategy::PerPage,
                    pages: 0,
                    error: Some(e.to_string()),
                });
                e
            }
        };

        for (strategy, options) in [
            (RasterStrategy::Bulk, self.strict),
            (RasterStrategy::BulkAutoSize, self.auto_size),
        ] {
            match self.renderer.render_all(pdf_path, &options, out_dir).await {
                Ok(mut images) => {
                    images.sort_by_key(|img| img.page_num());
                    // Pages past the cap are deleted as they drop.
                    images.truncate(max_pages);
                    info!(
                        "{} conversion produced {} pages",
                        strategy.as_str(),
                        images.len()
                    );
                    attempts.push(ConversionAttempt {
                        strategy,
                        pages: images.len(),
                        error: None,
                    });
                    return Ok(Rasterization { images, attempts });
                }
                Err(e) => {
                    warn!("{} conversion failed: {}", strategy.as_str(), e);
                    attempts.push(ConversionAttempt {
                        strategy,
                        pages: 0,
                        error: Some(e.to_string()),
                    });
                    last_err = e;
                }
            }
        }

        Err(ExtractError::RasterizationFailed {
            path: pdf_path.to_path_buf(),
            detail: last_err.to_string(),
        })
    }

    /// Strategy 1. `Err` only when page 1 itself fails.
    async fn render_per_page(
        &self,
        pdf_path: &Path,
        max_pages: usize,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, RenderError> {
        let mut images = Vec::new();
        for page_num in 1..=max_pages {
            match self
                .renderer
                .render_page(pdf_path, page_num, &self.strict, out_dir)
                .await
            {
                Ok(Some(image)) => images.push(image),
                Ok(None) => {
                    debug!("No page {}; end of document", page_num);
                    break;
                }
                Err(e) if page_num == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        "Page {} failed, keeping the {} pages already converted: {}",
                        page_num,
                        images.len(),
                        e
                    );
                    break;
                }
            }
        }
        Ok(images)
    }
}
