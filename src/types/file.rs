pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// MIME type of a file judged from its first bytes.
///
/// Known binary signatures win, valid UTF-8 is treated as plain text and
/// anything else falls back to `application/octet-stream`.
pub fn detect_mime_type(head: &[u8]) -> String {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }
    if !head.is_empty() && std::str::from_utf8(head).is_ok() {
        return "text/plain".to_string();
    }
    FALLBACK_MIME_TYPE.to_string()
}
