//! Post-processing: deterministic cleanup of OCR and model output.
//!
//! Two entry points:
//!
//! - [`clean_page_text`] runs on every page Tesseract returns. It removes the
//!   engine's artefacts (form feeds, CRLF, invisible characters, runs of
//!   blank lines) without touching words.
//! - [`clean_model_response`] runs on the correction model's answer. Models
//!   echo the response marker, wrap answers in code fences, or repeat the
//!   triple quotes the prompt used; all three are stripped.
//!
//! Each rule is a pure `&str → String` pass and is tested on its own.

use crate::prompts::RESPONSE_MARKER;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one page of raw OCR text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode and form feeds
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 1
/// 5. Trim the whole page
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Clean the correction model's response.
///
/// Rules (line endings normalised first, then repeated until stable):
/// 1. Strip an echoed response marker at the start
/// 2. Strip outer markdown fences
/// 3. Strip surrounding triple quotes
/// 4. Trim
///
/// Wrappers nest in any order (`marker` then fence, fence then `marker`).
pub fn clean_model_response(input: &str) -> String {
    let mut current = normalise_line_endings(input).trim().to_string();
    loop {
        let s = strip_response_marker(&current);
        let s = strip_markdown_fences(&s);
        let s = strip_triple_quotes(&s);
        let next = s.trim().to_string();
        // Every pass that changes the text shortens it.
        if next == current {
            return current;
        }
        current = next;
    }
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Remove invisible characters ───────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{000C}',
        ],
        "",
    )
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse excessive blank lines ─────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule: Strip outer markdown fences ────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:[A-Za-z]+)?\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule: Strip echoed response marker ───────────────────────────────────────

fn strip_response_marker(input: &str) -> String {
    let trimmed = input.trim_start();
    match trimmed.strip_prefix(RESPONSE_MARKER) {
        Some(rest) => rest.to_string(),
        None => input.to_string(),
    }
}

// ── Rule: Strip surrounding triple quotes ────────────────────────────────────

fn strip_triple_quotes(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
    {
        Some(inner) => inner.to_string(),
        None => input.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible_and_form_feed() {
        let input = "Hợp\u{200B}đồng\u{FEFF} số 12\u{000C}";
        assert_eq!(remove_invisible_chars(input), "Hợpđồng số 12");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  điều 1   \nđiều 2  "),
            "  điều 1\nđiều 2"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_page_text_tesseract_output() {
        let raw = "QUYẾT ĐỊNH   \r\n\r\n\r\n\r\nĐiều 1.\n\u{000C}";
        assert_eq!(clean_page_text(raw), "QUYẾT ĐỊNH\n\nĐiều 1.");
    }

    #[test]
    fn test_clean_page_text_blank_page() {
        assert_eq!(clean_page_text(" \n\u{000C}\n "), "");
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_markdown_fences("```text\nXin chào\n```"), "Xin chào");
        assert_eq!(strip_markdown_fences("```\nXin chào\n```"), "Xin chào");
        assert_eq!(strip_markdown_fences("Xin chào"), "Xin chào");
    }

    #[test]
    fn test_strip_marker() {
        let input = format!("{}\nCông ty ABC", RESPONSE_MARKER);
        assert_eq!(clean_model_response(&input), "Công ty ABC");
    }

    #[test]
    fn test_marker_inside_text_kept() {
        let input = format!("Công ty {} ABC", RESPONSE_MARKER);
        assert_eq!(clean_model_response(&input), input);
    }

    #[test]
    fn test_strip_triple_quotes() {
        assert_eq!(
            clean_model_response("\"\"\"\nCông ty ABC\n\"\"\""),
            "Công ty ABC"
        );
    }

    #[test]
    fn test_marker_then_fence() {
        let input = format!("{}\n```\nCông ty ABC\n```", RESPONSE_MARKER);
        assert_eq!(clean_model_response(&input), "Công ty ABC");
    }

    #[test]
    fn test_fence_then_marker() {
        let input = format!("```text\n{}\nCông ty ABC\n```\n", RESPONSE_MARKER);
        assert_eq!(clean_model_response(&input), "Công ty ABC");
    }

    #[test]
    fn test_marker_then_fenced_quotes() {
        let input = format!("  {}\r\n```\n\"\"\"\nĐiều 1.\n\"\"\"\n```", RESPONSE_MARKER);
        assert_eq!(clean_model_response(&input), "Điều 1.");
    }

    #[test]
    fn test_clean_model_response_combined() {
        let input = format!("```\n{} \"\"\"Giám đốc\"\"\"\n```", RESPONSE_MARKER);
        assert_eq!(clean_model_response(&input), "Giám đốc");
    }
}
