use std::sync::OnceLock;

use regex::Regex;

use super::parser::{HttpParser, StartLine};

fn status_line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(HTTP/[0-9]\.[0-9])\s+([0-9]{3})\s(.*)$").ok())
        .as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StartLine for StatusLine {
    fn parse(line: &str) -> Option<Self> {
        let caps = status_line_re()?.captures(line)?;
        Some(Self {
            version: caps[1].to_string(),
            code: caps[2].parse().ok()?,
            reason: caps[3].to_string(),
        })
    }
}

/// Parser for a handshake or proxy response.
pub type Response = HttpParser<StatusLine>;

impl HttpParser<StatusLine> {
    /// Status code, once the status line has been parsed.
    pub fn code(&self) -> Option<u16> {
        self.start_line().map(|line| line.code)
    }
}
