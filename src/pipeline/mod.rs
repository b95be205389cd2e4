//! Pipeline stages for PDF text extraction.
//!
//! Each submodule implements one step. The external backends (pdfium,
//! tesseract, the language model) sit behind traits so every stage can be
//! tested with doubles and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ textlayer ──▶ classify ──▶ render ──▶ ocr ──▶ correct
//! (path)    (pdfium)      (heuristic)  (pdfium)  (tesseract) (LLM)
//! ```
//!
//! 1. [`input`]     — validate the user-supplied path
//! 2. [`textlayer`] — read the embedded text layer
//! 3. [`classify`]  — decide whether that text is real or a scan's noise
//! 4. [`render`]    — rasterise pages with the three-strategy fallback;
//!    pdfium runs in `spawn_blocking` because it is not async-safe
//! 5. [`ocr`]       — recognise each page image, then delete it
//! 6. [`correct`]   — repair OCR spelling with a chat model, validated
//! 7. [`postprocess`] — deterministic cleanup of OCR pages and model answers

pub mod classify;
pub mod correct;
pub mod input;
pub mod ocr;
pub(crate) mod pdfium;
pub mod postprocess;
pub mod render;
pub mod textlayer;
