//! Scan classifier: is a PDF's text layer real text or extraction noise?
//!
//! Scanned PDFs usually have no text layer at all, or a thin one made of
//! stray glyphs, page numbers and decorative symbols. Two thresholds
//! separate those from a document that was typed:
//!
//! 1. fewer than [`MIN_TEXT_LEN`] characters after trimming, or
//! 2. fewer than [`MIN_MEANINGFUL_CHARS`] Latin/Vietnamese letters and digits
//!    once whitespace, punctuation and symbols are removed.

/// Minimum trimmed length of a real text layer.
pub const MIN_TEXT_LEN: usize = 100;

/// Minimum number of letters/digits in a real text layer.
pub const MIN_MEANINGFUL_CHARS: usize = 50;

/// Return `true` when `text` looks like it came from a scanned page.
///
/// Lengths are counted in characters, not bytes, so Vietnamese text with
/// multi-byte diacritics is measured the same as ASCII.
pub fn is_scanned(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_LEN {
        return true;
    }
    meaningful_char_count(trimmed) < MIN_MEANINGFUL_CHARS
}

/// Count characters in the combined Latin + Vietnamese alphanumeric set.
pub fn meaningful_char_count(text: &str) -> usize {
    text.chars().filter(|&c| is_meaningful(c)).count()
}

/// ASCII letters and digits plus every precomposed Vietnamese letter.
fn is_meaningful(c: char) -> bool {
    if c.is_ascii_alphanumeric() {
        return true;
    }
    matches!(c,
        // Latin-1: À Á Â Ã È É Ê Ì Í Ò Ó Ô Õ Ù Ú Ý and lowercase
        '\u{00C0}'..='\u{00C3}' | '\u{00C8}'..='\u{00CA}' | '\u{00CC}' | '\u{00CD}'
        | '\u{00D2}'..='\u{00D5}' | '\u{00D9}' | '\u{00DA}' | '\u{00DD}'
        | '\u{00E0}'..='\u{00E3}' | '\u{00E8}'..='\u{00EA}' | '\u{00EC}' | '\u{00ED}'
        | '\u{00F2}'..='\u{00F5}' | '\u{00F9}' | '\u{00FA}' | '\u{00FD}'
        // Ă ă Đ đ Ĩ ĩ Ũ ũ Ơ ơ Ư ư
        | '\u{0102}' | '\u{0103}' | '\u{0110}' | '\u{0111}' | '\u{0128}' | '\u{0129}'
        | '\u{0168}' | '\u{0169}' | '\u{01A0}' | '\u{01A1}' | '\u{01AF}' | '\u{01B0}'
        // Latin Extended Additional: Ạ … ỹ
        | '\u{1EA0}'..='\u{1EF9}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_short_text_is_scanned() {
        assert!(is_scanned(""));
        assert!(is_scanned("   \n\t "));
        assert!(is_scanned("Trang 1"));
        assert!(is_scanned(&"a".repeat(99)));
    }

    #[test]
    fn short_after_trimming_is_scanned() {
        let padded = format!("{}{}{}", " ".repeat(200), "x".repeat(60), "\n".repeat(200));
        assert!(is_scanned(&padded));
    }

    #[test]
    fn symbol_noise_is_scanned() {
        // 120 chars but only 40 alphanumerics.
        let noise = format!("{}{}", "•—|~".repeat(20), "ab".repeat(20));
        assert!(noise.chars().count() >= MIN_TEXT_LEN);
        assert!(is_scanned(&noise));
    }

    #[test]
    fn real_vietnamese_text_is_not_scanned() {
        let text = "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM\nĐộc lập - Tự do - Hạnh phúc\n\
                    HỢP ĐỒNG LAO ĐỘNG số 15/2024/HĐLĐ giữa Công ty và người lao động.";
        assert!(!is_scanned(text));
    }

    #[test]
    fn exactly_fifty_meaningful_chars_is_not_scanned() {
        let text = format!("{}{}", "đ".repeat(50), ".".repeat(60));
        assert_eq!(meaningful_char_count(&text), 50);
        assert!(!is_scanned(&text));
    }

    #[test]
    fn vietnamese_letters_are_meaningful() {
        for c in "ăâđêôơưàảãáạằẳẵắặầẩẫấậèẻẽéẹềểễếệìỉĩíịòỏõóọồổỗốộờởỡớợùủũúụừửữứựỳỷỹýỵĐƯƠ".chars()
        {
            assert!(is_meaningful(c), "{c} should count");
        }
        for c in "!?.,;:-—•©®°€ \n\t".chars() {
            assert!(!is_meaningful(c), "{c:?} should not count");
        }
    }

    #[test]
    fn multibyte_length_counts_chars() {
        // 99 two-byte letters = 198 bytes but still below the length threshold.
        assert!(is_scanned(&"ư".repeat(99)));
        assert!(!is_scanned(&"ư".repeat(100)));
    }
}
