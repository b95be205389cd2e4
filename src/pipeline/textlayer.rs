//! Direct text extraction: read a PDF's embedded text layer.
//!
//! This feeds the scan classifier only. A text-layer failure is never fatal;
//! the orchestrator treats it as "no text", which classifies as scanned and
//! sends the document down the OCR path.

use crate::error::RenderError;
use crate::pipeline::pdfium;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Source of a PDF's embedded text.
#[async_trait]
pub trait TextLayer: Send + Sync {
    /// Return the text layer of every page, joined by newlines.
    async fn extract(&self, pdf_path: &Path) -> Result<String, RenderError>;
}

/// Text layer read through pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumTextLayer;

#[async_trait]
impl TextLayer for PdfiumTextLayer {
    async fn extract(&self, pdf_path: &Path) -> Result<String, RenderError> {
        let path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_blocking(&path))
            .await
            .map_err(|e| RenderError::Task(format!("Text extraction task panicked: {}", e)))?
    }
}

/// Blocking implementation of text-layer extraction.
fn extract_blocking(pdf_path: &Path) -> Result<String, RenderError> {
    let pdfium = pdfium::bind()?;
    let document = pdfium::open(&pdfium, pdf_path)?;

    let mut parts = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| RenderError::Page {
            page: idx + 1,
            detail: format!("{:?}", e),
        })?;
        parts.push(text.all());
    }

    let text = parts.join("\n");
    debug!(
        "Text layer: {} pages, {} chars",
        parts.len(),
        text.chars().count()
    );
    Ok(text)
}
