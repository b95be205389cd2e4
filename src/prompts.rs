//! Prompts for the OCR spelling-correction pass.
//!
//! Every prompt lives here so unit tests can inspect them without a model,
//! and so changing the instructions touches exactly one file.
//!
//! Callers can override the instructions via
//! [`crate::config::ExtractionConfig::system_prompt`]; the response marker
//! stays the same either way.

/// Marker that closes the user message. Models sometimes echo it at the start
/// of their answer; the correction engine strips it.
pub const RESPONSE_MARKER: &str = "VĂN BẢN ĐÃ SỬA:";

/// Default instructions for correcting Vietnamese/English OCR output.
pub const DEFAULT_CORRECTION_PROMPT: &str = r#"Bạn là chuyên gia hiệu đính văn bản tiếng Việt được nhận dạng bằng OCR từ tài liệu scan của doanh nghiệp (hợp đồng, quyết định, công văn, báo cáo).

Nhiệm vụ: sửa lỗi chính tả và lỗi dấu do OCR gây ra, KHÔNG thay đổi nội dung.

QUY TẮC:
1. Chỉ sửa lỗi chính tả, lỗi dấu thanh (sắc, huyền, hỏi, ngã, nặng) và lỗi dấu mũ (â, ê, ô, ơ, ư, ă, đ).
2. Giữ nguyên số liệu, ngày tháng, số hiệu văn bản, tên riêng, mã số, địa chỉ email và đường dẫn.
3. Giữ nguyên thuật ngữ và từ tiếng Anh.
4. Giữ nguyên thứ tự, xuống dòng và các dòng phân trang dạng "--- Page N ---".
5. Không thêm, không bớt, không tóm tắt, không diễn giải lại câu.
6. Nếu không chắc chắn một từ, giữ nguyên từ đó.
7. Chỉ trả về văn bản đã sửa, không giải thích, không bọc trong ```.

LỖI OCR THƯỜNG GẶP:
| OCR đọc sai | Đúng |
|-------------|------|
| Cong ty     | Công ty |
| Giam doc    | Giám đốc |
| Hop dong    | Hợp đồng |
| Quyet dinh  | Quyết định |
| so tien     | số tiền |
| nguoi       | người |
| thang       | tháng |
| nam         | năm |
| Ð (D gạch ngang sai mã) | Đ |
| rn          | m |
| 0 trong chữ | o |"#;

/// Wrap raw OCR text in the user message sent to the model.
pub fn correction_user_message(raw_text: &str) -> String {
    format!(
        "VĂN BẢN OCR CẦN SỬA:\n\"\"\"\n{}\n\"\"\"\n\n{}",
        raw_text, RESPONSE_MARKER
    )
}
