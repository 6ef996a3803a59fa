//! Incremental HTTP/1.1 head parsing for handshakes.

mod parser;
mod request;
mod response;

pub use parser::{HeaderMap, HttpParser, StartLine, MAX_LINE_LENGTH};
pub use request::{Request, RequestLine};
pub use response::{Response, StatusLine};

/// Canonical form of a header name for lookups and de-duplication.
///
/// Trims, lowercases, drops a rack-style `http_` prefix and turns
/// underscores into dashes, so `HTTP_SEC_WEBSOCKET_KEY` and
/// `Sec-WebSocket-Key` compare equal.
pub fn normalize_header(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let stripped = lower.strip_prefix("http_").unwrap_or(&lower);
    stripped.replace('_', "-")
}
