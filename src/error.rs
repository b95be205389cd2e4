//! Error types for the pdftext-ocr library.
//!
//! * [`ExtractError`] — **Fatal**: the document cannot produce text at all
//!   (bad input file, every rasterisation strategy failed, no page images).
//!   Returned as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`RenderError`] — one rasterisation strategy failed. The rasteriser
//!   falls through to the next strategy; the last error is attached to
//!   [`ExtractError::RasterizationFailed`] when none is left.
//!
//! * [`RecognitionError`] — **Non-fatal**: OCR failed on one page image. The
//!   recognition engine logs it and yields empty text for that page so the
//!   remaining pages still get read.
//!
//! * [`CorrectionError`] — **Non-fatal**: the language-model pass failed. The
//!   correction engine logs it and returns the uncorrected text.
//!
//! Only `ExtractError` ever reaches the caller.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdftext-ocr library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// Per-page, bulk and auto-sized conversion all failed.
    #[error("Failed to convert PDF '{path}' to images: {detail}")]
    RasterizationFailed { path: PathBuf, detail: String },

    /// Rasterisation reported success but produced no page images.
    #[error("No images could be extracted from PDF '{path}'")]
    NoImagesExtracted { path: PathBuf },

    // ── Environment errors ────────────────────────────────────────────────
    /// The scratch directory for page images could not be created or used.
    #[error("Scratch directory '{path}' is unusable: {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The named LLM provider could not be instantiated.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A rasterisation backend call failed.
///
/// The rasteriser records it and moves to the next strategy; only the last
/// one reaches the caller, inside [`ExtractError::RasterizationFailed`].
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Could not bind to a pdfium library.
    #[error(
        "failed to bind to pdfium library: {0} \
(set PDFIUM_LIB_PATH=/path/to/libpdfium or install it where the system loader can find it)"
    )]
    Binding(String),

    /// pdfium could not open the document.
    #[error("cannot open PDF: {0}")]
    Open(String),

    /// A page could not be loaded or rendered.
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// The rendered page could not be written to the scratch directory.
    #[error("cannot write page image '{path}': {detail}")]
    Write { path: PathBuf, detail: String },

    /// The blocking render task panicked or was cancelled.
    #[error("render task failed: {0}")]
    Task(String),
}

/// OCR failed for a single page image.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The OCR executable could not be started.
    #[error("failed to run '{program}': {detail}")]
    Spawn { program: String, detail: String },

    /// The OCR executable exited unsuccessfully.
    #[error("OCR exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    /// Recognition exceeded the per-page timeout.
    #[error("OCR timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The page image could not be read.
    #[error("cannot read page image: {0}")]
    Io(String),
}

/// The language-model correction call failed.
#[derive(Debug, Clone, Error)]
pub enum CorrectionError {
    /// The provider returned an error after all retries.
    #[error("LLM call failed after {retries} retries: {detail}")]
    Api { retries: u32, detail: String },

    /// The call exceeded the per-call timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterization_failed_carries_last_cause() {
        let e = ExtractError::RasterizationFailed {
            path: PathBuf::from("/tmp/scan.pdf"),
            detail: "bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.pdf"), "got: {msg}");
        assert!(msg.contains("bad xref"), "got: {msg}");
    }

    #[test]
    fn no_images_display() {
        let e = ExtractError::NoImagesExtracted {
            path: PathBuf::from("empty.pdf"),
        };
        assert!(e.to_string().contains("No images"));
    }

    #[test]
    fn render_page_display() {
        let e = RenderError::Page {
            page: 3,
            detail: "FormatError".into(),
        };
        assert_eq!(e.to_string(), "page 3: FormatError");
    }

    #[test]
    fn recognition_exit_display() {
        let e = RecognitionError::Exit {
            code: 1,
            stderr: "Failed loading language 'vie'".into(),
        };
        assert!(e.to_string().contains("code 1"));
        assert!(e.to_string().contains("vie"));
    }

    #[test]
    fn correction_timeout_display() {
        let e = CorrectionError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
