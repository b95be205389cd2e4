//! CLI binary for pdftext-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdftext_ocr::config::default_scratch_dir;
use pdftext_ocr::{
    CorrectionOutcome, ExtractionConfig, ExtractionProgressCallback, Extractor, ProgressCallback,
    ReplacementTable, TextOrigin,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages may finish out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading text layer and rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanned document: reading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_empty(&self, page_num: usize, total: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            yellow("∅"),
            page_num,
            total,
            yellow("no text"),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_correction_complete(&self, outcome: &CorrectionOutcome) {
        let line = match outcome {
            CorrectionOutcome::Applied => format!("{} Correction applied", green("✓")),
            CorrectionOutcome::Rejected(why) => {
                format!("{} Correction rejected: {}", yellow("⚠"), why)
            }
            CorrectionOutcome::Failed(why) => {
                format!("{} Correction failed: {}", yellow("⚠"), why)
            }
            CorrectionOutcome::Disabled => format!("{} Correction disabled", dim("·")),
            CorrectionOutcome::SkippedShort | CorrectionOutcome::NotAttempted => return,
        };
        self.bar.println(format!("  {line}"));
    }

    fn on_extraction_complete(&self, total_pages: usize, text_pages: usize) {
        self.bar.finish_and_clear();
        let empty = total_pages.saturating_sub(text_pages);
        if empty == 0 {
            eprintln!(
                "{} {} pages read",
                green("✔"),
                bold(&text_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages read  ({} without text)",
                yellow("⚠"),
                bold(&text_pages.to_string()),
                total_pages,
                yellow(&empty.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text (stdout)
  pdftext scan.pdf

  # Write to a file, first 3 pages only
  pdftext --max-pages 3 scan.pdf -o scan.txt

  # OCR without the language-model pass (no API key needed)
  pdftext --no-correct scan.pdf

  # Is the text layer real, or is this a scan?
  pdftext --classify-only document.pdf

  # Re-run correction on stored OCR text
  pdftext --correct-only raw.txt -o fixed.txt

  # Full diagnostics as JSON
  pdftext --json scan.pdf > result.json

  # Extra organisation names OCR keeps misreading
  pdftext --replacements names.json scan.pdf

REPLACEMENT TABLE FORMAT:
  [
    {"find": "CONG TY CO PHAN", "replace": "CÔNG TY CỔ PHẦN"},
    {"find": "Phong Ke toan",   "replace": "Phòng Kế toán"}
  ]

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (correction pass)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, e.g. pdftext_ocr=debug

REQUIREMENTS:
  tesseract with the 'vie' and 'eng' traineddata
  (Debian/Ubuntu: apt install tesseract-ocr tesseract-ocr-vie)
  a pdfium shared library in ./, on the loader path, or at PDFIUM_LIB_PATH
"#;

/// Extract text from PDFs, with OCR and LLM correction for scans.
#[derive(Parser, Debug)]
#[command(
    name = "pdftext",
    version,
    about = "Extract text from PDFs, with OCR and LLM correction for scanned documents",
    long_about = "Extract plain text from PDF documents. Typed PDFs return their text layer; \
scanned PDFs are rasterised at 600 DPI, read with Tesseract (Vietnamese + English) and \
repaired by a language model. Supports OpenAI, Anthropic, Google Gemini and any provider \
edgequake-llm can reach.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file (or a UTF-8 text file with --correct-only).
    input: PathBuf,

    /// Write text to this file instead of stdout.
    #[arg(short, long, env = "PDFTEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (ExtractionOutput) instead of text.
    #[arg(long, env = "PDFTEXT_JSON")]
    json: bool,

    /// Only report whether the text layer looks scanned.
    #[arg(long, conflicts_with = "correct_only")]
    classify_only: bool,

    /// Treat the input as text and run the correction pass only.
    #[arg(long)]
    correct_only: bool,

    /// Maximum pages to OCR.
    #[arg(long, env = "PDFTEXT_MAX_PAGES", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: u64,

    /// Tesseract language string.
    #[arg(long, env = "PDFTEXT_LANG", default_value = "vie+eng")]
    lang: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "PDFTEXT_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Pages recognised concurrently.
    #[arg(short, long, env = "PDFTEXT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Skip the language-model correction pass.
    #[arg(long, env = "PDFTEXT_NO_CORRECT")]
    no_correct: bool,

    /// LLM model ID for correction (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          A provider named here that cannot be configured is an error; an\n\
          undetectable provider only disables correction."
    )]
    provider: Option<String>,

    /// JSON replacement table added after the built-in rules.
    #[arg(long, env = "PDFTEXT_REPLACEMENTS")]
    replacements: Option<PathBuf>,

    /// Directory for page images.
    #[arg(long, env = "PDFTEXT_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "PDFTEXT_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Correction call timeout in seconds.
    #[arg(long, env = "PDFTEXT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Leave the scratch directory as is after the run.
    #[arg(long)]
    keep_scratch: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFTEXT_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFTEXT_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.classify_only && !cli.correct_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let scratch = run_scratch_dir(&cli)?;
    let config = build_config(&cli, scratch.path(), progress_cb)?;
    let extractor = Extractor::new(config).context("Failed to set up extraction")?;

    let result = run(&cli, &extractor).await;

    if !cli.keep_scratch {
        extractor.cleanup();
    }
    result
}

/// A `run-*` directory of this process inside the scratch base, so the final
/// cleanup never touches another `pdftext` running concurrently.
fn run_scratch_dir(cli: &Cli) -> Result<tempfile::TempDir> {
    let base = cli.scratch_dir.clone().unwrap_or_else(default_scratch_dir);
    std::fs::create_dir_all(&base)
        .with_context(|| format!("Failed to create scratch directory {:?}", base))?;
    tempfile::Builder::new()
        .prefix("run-")
        .keep(cli.keep_scratch)
        .tempdir_in(&base)
        .with_context(|| format!("Failed to create scratch directory in {:?}", base))
}

async fn run(cli: &Cli, extractor: &Extractor) -> Result<()> {
    // ── Classify-only mode ───────────────────────────────────────────────
    if cli.classify_only {
        let scanned = extractor
            .classify(&cli.input)
            .await
            .context("Failed to classify PDF")?;
        if cli.json {
            let json = serde_json::json!({
                "path": &cli.input,
                "scanned": scanned,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            println!(
                "{}: {}",
                cli.input.display(),
                if scanned { "scanned" } else { "text" }
            );
        }
        return Ok(());
    }

    // ── Correct-only mode ────────────────────────────────────────────────
    if cli.correct_only {
        let raw = tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read text from {:?}", cli.input))?;
        let text = extractor.correct_text(&raw).await;
        return emit_text(cli, &text);
    }

    // ── Extraction ───────────────────────────────────────────────────────
    let max_pages = usize::try_from(cli.max_pages).unwrap_or(usize::MAX);
    let output = extractor
        .extract(&cli.input, max_pages)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        emit_text(cli, &json)?;
    } else {
        emit_text(cli, &output.text)?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {} ({} chars)  {}ms total",
            dim("·"),
            match output.origin {
                TextOrigin::Direct => "text layer",
                TextOrigin::Ocr => "OCR",
            },
            output.text.chars().count(),
            output.stats.total_duration_ms,
        );
    }
    Ok(())
}

/// Print `text` to stdout, or write it to `--output`.
fn emit_text(cli: &Cli, text: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        write_atomic(path, text)?;
        if !cli.quiet {
            eprintln!("{} wrote {}", green("✔"), bold(&path.display().to_string()));
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Write through a temp file in the same directory, then rename over `path`.
fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory {:?}", dir))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
    tmp.write_all(text.as_bytes())
        .context("Failed to write output")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    scratch_dir: &Path,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut replacements = ReplacementTable::default();
    if let Some(ref path) = cli.replacements {
        let extra = ReplacementTable::from_json_file(path)
            .with_context(|| format!("Failed to load replacements from {:?}", path))?;
        replacements.extend(extra);
    }

    let mut builder = ExtractionConfig::builder()
        .max_pages(usize::try_from(cli.max_pages).unwrap_or(usize::MAX))
        .ocr_language(cli.lang.clone())
        .tesseract_path(cli.tesseract.clone())
        .concurrency(cli.concurrency)
        // Classification never calls the model.
        .correction_enabled(!cli.no_correct && !cli.classify_only)
        .scratch_dir(scratch_dir)
        .replacements(replacements)
        .ocr_timeout_secs(cli.ocr_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("pdftext").chain(args.iter().copied()))
    }

    #[test]
    fn cleanup_stays_inside_this_run() {
        let base = tempfile::tempdir().unwrap();
        let base_arg = base.path().to_str().unwrap();
        let args = cli(&["scan.pdf", "--no-correct", "--scratch-dir", base_arg]);

        let ours = run_scratch_dir(&args).unwrap();
        let other = run_scratch_dir(&args).unwrap();
        let other_page = other.path().join("page-0001.png");
        std::fs::write(&other_page, b"png").unwrap();

        let config = build_config(&args, ours.path(), None).unwrap();
        let extractor = Extractor::new(config).unwrap();
        assert_eq!(extractor.scratch_dir(), ours.path());
        extractor.cleanup();
        assert!(other_page.exists());

        let ours_path = ours.path().to_path_buf();
        drop(ours);
        assert!(!ours_path.exists());
    }

    #[test]
    fn keep_scratch_leaves_run_dir() {
        let base = tempfile::tempdir().unwrap();
        let base_arg = base.path().to_str().unwrap();
        let args = cli(&["scan.pdf", "--keep-scratch", "--scratch-dir", base_arg]);

        let run_dir = run_scratch_dir(&args).unwrap();
        let path = run_dir.path().to_path_buf();
        drop(run_dir);
        assert!(path.is_dir());
    }

    #[test]
    fn classify_only_disables_correction() {
        let scratch = tempfile::tempdir().unwrap();
        let config = build_config(&cli(&["scan.pdf", "--classify-only"]), scratch.path(), None)
            .unwrap();
        assert!(!config.correction_enabled);

        let config = build_config(&cli(&["scan.pdf"]), scratch.path(), None).unwrap();
        assert!(config.correction_enabled);
    }
}
