//! Input validation: check a user-supplied path before any backend sees it.
//!
//! pdfium and Tesseract produce opaque errors on a missing or non-PDF file.
//! Checking existence, read permission and the `%PDF` magic bytes up front
//! gives callers a precise [`ExtractError`] instead.

use crate::error::ExtractError;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` is a readable PDF and return it as an owned path.
///
/// A directory, or a file shorter than the magic, is `NotAPdf`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, ExtractError> {
    let path = path.to_path_buf();

    let metadata = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) => return Err(open_error(path, &e)),
    };
    if !metadata.is_file() {
        return Err(ExtractError::NotAPdf {
            path,
            magic: [0u8; 4],
        });
    }

    let file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) => return Err(open_error(path, &e)),
    };

    let mut magic = [0u8; 4];
    let read = read_prefix(file, &mut magic).map_err(|e| open_error(path.clone(), &e))?;
    if read < magic.len() || &magic != b"%PDF" {
        return Err(ExtractError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Fill as much of `buf` as the file holds; returns the byte count.
fn read_prefix(mut file: File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn open_error(path: PathBuf, e: &std::io::Error) -> ExtractError {
    match e.kind() {
        ErrorKind::PermissionDenied => ExtractError::PermissionDenied { path },
        _ => ExtractError::FileNotFound { path },
    }
}
