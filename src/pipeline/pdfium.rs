//! Binding to the pdfium shared library.
//!
//! pdfium is loaded at runtime. Resolution order:
//!
//! 1. `PDFIUM_LIB_PATH` — an explicit library file
//! 2. the platform library name in the current directory (`./libpdfium.so`, …)
//! 3. the system loader's search path

use crate::error::RenderError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium using the resolution order above.
pub fn bind() -> Result<Pdfium, RenderError> {
    if let Ok(p) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let path = PathBuf::from(p);
        if path.exists() {
            debug!("Binding pdfium from {}", path.display());
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| RenderError::Binding(format!("{}: {}", path.display(), e)));
        }
        debug!(
            "{} '{}' not found; trying default locations",
            PDFIUM_LIB_PATH_ENV,
            path.display()
        );
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| RenderError::Binding(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

/// Open a document, mapping pdfium's error into [`RenderError::Open`].
pub fn open<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &std::path::Path,
) -> Result<PdfDocument<'a>, RenderError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| RenderError::Open(format!("{}: {:?}", pdf_path.display(), e)))
}
