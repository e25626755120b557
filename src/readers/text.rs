//! Plain-text reader.

use crate::format::SourceDocument;

/// Decode text bytes: UTF-8 (lossy), BOM removed, line endings normalised.
pub fn extract_text(doc: &SourceDocument) -> String {
    decode_text(&doc.bytes)
}

pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}
