//! Scratch directory for page images.
//!
//! One process-wide directory holds every page image while it is read. Each
//! extraction gets its own [`WorkDir`] inside it, so concurrent extractions
//! never see each other's files, and anything still present when the
//! extraction ends (error, early return, a dropped future) is removed with
//! the `WorkDir`.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// The process-wide directory for page images.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Use `root`, creating it if absent.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| ExtractError::ScratchDir {
            path: root.clone(),
            source,
        })?;
        debug!("Scratch directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Allocate a private directory for one extraction.
    pub fn work_dir(&self) -> Result<WorkDir, ExtractError> {
        // Another caller may have cleaned up the root in the meantime.
        std::fs::create_dir_all(&self.root).map_err(|source| ExtractError::ScratchDir {
            path: self.root.clone(),
            source,
        })?;
        let dir = tempfile::Builder::new()
            .prefix("extract-")
            .tempdir_in(&self.root)
            .map_err(|source| ExtractError::ScratchDir {
                path: self.root.clone(),
                source,
            })?;
        Ok(WorkDir { dir })
    }

    /// Remove everything inside the scratch directory.
    ///
    /// Safe on an empty or missing directory. Individual removal failures are
    /// logged and skipped; the count of removed entries is returned.
    pub fn cleanup(&self) -> usize {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Cannot list scratch directory {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                // Concurrently deleted by its owner.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
            }
        }
        debug!("Scratch cleanup removed {} entries", removed);
        removed
    }
}

/// A per-extraction directory, deleted with its contents on drop.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
