//! Strict UTF-8 validation for text payloads and close reasons.

/// Returns true if `bytes` is well-formed UTF-8.
///
/// Overlong encodings, surrogate code points (U+D800..U+DFFF), code points
/// above U+10FFFF and truncated sequences are all rejected.
pub fn is_valid(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

/// Decodes `bytes` as UTF-8, or returns `None` if they are malformed.
pub fn decode(bytes: Vec<u8>) -> Option<String> {
    String::from_utf8(bytes).ok()
}
