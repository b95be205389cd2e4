//! Optical character recognition of page images.
//!
//! [`TesseractRecognizer`] drives the `tesseract` executable with settings
//! tuned for 600 DPI scans of Vietnamese business documents:
//!
//! | Option | Value | Effect |
//! |--------|-------|--------|
//! | `-l` | `vie+eng` | Vietnamese first, English for names and codes |
//! | `--psm 6` | single uniform block | keeps paragraph order on letter-style pages |
//! | `--oem 1` | LSTM only | best accuracy on diacritics |
//! | `--dpi` | render DPI | stops the engine guessing the resolution |
//! | `preserve_interword_spaces` | 1 | keeps column alignment in tables |
//! | `classify_enable_learning` | 0 | no adaptive drift across a page |
//! | `load_freq_dawg`, `load_system_dawg` | 1 | dictionary-assisted word choice |
//! | `textord_min_xheight` | configurable | drops speckles at high DPI |
//! | `edges_max_children_per_outline` | 40 | lets stacked diacritics join their glyph |
//!
//! [`RecognitionEngine`] wraps any [`Recognizer`] with the per-page policy:
//! timeout, errors become empty text, cleanup, literal replacements, and
//! deletion of the image afterwards.

use crate::config::{ExtractionConfig, ReplacementTable};
use crate::error::RecognitionError;
use crate::output::PageText;
use crate::pipeline::postprocess::clean_page_text;
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound on what OCR stderr is kept inside an error.
const MAX_STDERR_CHARS: usize = 500;

/// An OCR backend.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise the text in one page image.
    async fn recognize(&self, image_path: &Path) -> Result<String, RecognitionError>;
}

/// Recognition through the Tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: String,
    language: String,
    dpi: u32,
    min_xheight: u32,
}

impl TesseractRecognizer {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            program: config.tesseract_path.clone(),
            language: config.ocr_language.clone(),
            dpi: config.dpi,
            min_xheight: config.min_xheight,
        }
    }

    /// Full argument list for one image; output goes to stdout.
    pub fn args(&self, image_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            image_path.into(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
            "--psm".into(),
            "6".into(),
            "--oem".into(),
            "1".into(),
            "--dpi".into(),
            self.dpi.to_string().into(),
        ];
        for var in [
            "preserve_interword_spaces=1".to_string(),
            "classify_enable_learning=0".to_string(),
            "load_freq_dawg=1".to_string(),
            "load_system_dawg=1".to_string(),
            format!("textord_min_xheight={}", self.min_xheight),
            "edges_max_children_per_outline=40".to_string(),
        ] {
            args.push("-c".into());
            args.push(var.into());
        }
        args
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(&self, image_path: &Path) -> Result<String, RecognitionError> {
        if !image_path.exists() {
            return Err(RecognitionError::Io(format!(
                "{} does not exist",
                image_path.display()
            )));
        }

        // kill_on_drop: a timed-out future must not leave tesseract running.
        let output = Command::new(&self.program)
            .args(self.args(image_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RecognitionError::Spawn {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Exit {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().chars().take(MAX_STDERR_CHARS).collect(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Per-page recognition policy around a [`Recognizer`].
#[derive(Clone)]
pub struct RecognitionEngine {
    recognizer: Arc<dyn Recognizer>,
    timeout: Duration,
    replacements: ReplacementTable,
}

impl RecognitionEngine {
    pub fn new(recognizer: Arc<dyn Recognizer>, config: &ExtractionConfig) -> Self {
        Self {
            recognizer,
            timeout: Duration::from_secs(config.ocr_timeout_secs),
            replacements: config.replacements.clone(),
        }
    }

    /// Recognise one page and delete its image.
    ///
    /// Never fails: a backend error or timeout is logged and the page's text
    /// is empty.
    pub async fn recognize_page(&self, image: PageImage) -> PageText {
        let page_num = image.page_num();
        let raw = match tokio::time::timeout(self.timeout, self.recognizer.recognize(image.path()))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Page {}: OCR failed, continuing without it: {}", page_num, e);
                String::new()
            }
            Err(_) => {
                warn!(
                    "Page {}: {}",
                    page_num,
                    RecognitionError::Timeout {
                        secs: self.timeout.as_secs()
                    }
                );
                String::new()
            }
        };
        image.discard();

        let text = self.replacements.apply(&clean_page_text(&raw));
        debug!("Page {}: {} chars recognised", page_num, text.chars().count());
        PageText { page_num, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixed(Result<&'static str, RecognitionError>);

    #[async_trait]
    impl Recognizer for Fixed {
        async fn recognize(&self, _image_path: &Path) -> Result<String, RecognitionError> {
            self.0.clone().map(str::to_string)
        }
    }

    struct Stalls;

    #[async_trait]
    impl Recognizer for Stalls {
        async fn recognize(&self, _image_path: &Path) -> Result<String, RecognitionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".into())
        }
    }

    fn page_image(dir: &Path, page_num: usize) -> (PageImage, PathBuf) {
        let path = dir.join(format!("page-{page_num}.png"));
        std::fs::write(&path, b"png").unwrap();
        (PageImage::new(path.clone(), page_num, 10, 10), path)
    }

    fn engine(recognizer: Arc<dyn Recognizer>) -> RecognitionEngine {
        let config = ExtractionConfig::builder()
            .replacements(ReplacementTable::from_pairs([("CONG TY", "CÔNG TY")]))
            .build()
            .unwrap();
        RecognitionEngine::new(recognizer, &config)
    }

    #[test]
    fn args_carry_tuning() {
        let r = TesseractRecognizer::from_config(&ExtractionConfig::default());
        let args: Vec<String> = r
            .args(Path::new("/tmp/p.png"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..4], &["/tmp/p.png", "stdout", "-l", "vie+eng"]);
        let joined = args.join(" ");
        assert!(joined.contains("--psm 6"));
        assert!(joined.contains("--oem 1"));
        assert!(joined.contains("--dpi 600"));
        assert!(joined.contains("-c textord_min_xheight=20"));
        assert!(joined.contains("-c edges_max_children_per_outline=40"));
        assert!(joined.contains("-c preserve_interword_spaces=1"));
    }

    #[tokio::test]
    async fn recognized_text_is_cleaned_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let (image, path) = page_image(dir.path(), 2);
        let e = engine(Arc::new(Fixed(Ok("CONG TY ABC  \r\n\n\n\nHà Nội\u{000C}"))));
        let page = e.recognize_page(image).await;
        assert_eq!(page.page_num, 2);
        assert_eq!(page.text, "CÔNG TY ABC\n\nHà Nội");
        assert!(!path.exists(), "image should be deleted after OCR");
    }

    #[tokio::test]
    async fn failure_yields_empty_page_and_deletes_image() {
        let dir = tempfile::tempdir().unwrap();
        let (image, path) = page_image(dir.path(), 1);
        let e = engine(Arc::new(Fixed(Err(RecognitionError::Exit {
            code: 1,
            stderr: "bad image".into(),
        }))));
        let page = e.recognize_page(image).await;
        assert!(page.text.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let (image, path) = page_image(dir.path(), 1);
        let e = engine(Arc::new(Stalls));
        let page = e.recognize_page(image).await;
        assert!(page.text.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_image, path) = page_image(dir.path(), 1);
        let config = ExtractionConfig::builder()
            .tesseract_path("/nonexistent/tesseract")
            .build()
            .unwrap();
        let err = TesseractRecognizer::from_config(&config)
            .recognize(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Spawn { .. }), "got {err:?}");
    }
}
