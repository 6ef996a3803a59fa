use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use super::normalize_header;

/// Longest request, status or header line accepted, in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

/// Received headers keyed by [`normalize_header`] name. A repeated header
/// keeps its last value.
pub type HeaderMap = BTreeMap<String, String>;

fn header_line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([!#$%&'*+\-.^_`|~0-9a-z]+):\s*((?:\t|[\x20-\x7e])*?)\s*$").ok()
    })
    .as_ref()
}

/// The first line of an HTTP message.
pub trait StartLine: Sized {
    fn parse(line: &str) -> Option<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    StartLine,
    Headers,
    Complete,
    Error,
}

/// Byte-at-a-time parser for an HTTP head (start line plus headers).
///
/// Lines end in LF with an optional preceding CR. Once the blank line is
/// seen the parser is complete and every further byte is kept as body.
#[derive(Debug, Clone)]
pub struct HttpParser<S> {
    stage: Stage,
    buffer: Vec<u8>,
    start_line: Option<S>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl<S: StartLine> Default for HttpParser<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StartLine> HttpParser<S> {
    pub fn new() -> Self {
        Self {
            stage: Stage::StartLine,
            buffer: Vec::new(),
            start_line: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    pub fn is_error(&self) -> bool {
        self.stage == Stage::Error
    }

    pub fn parse(&mut self, data: &[u8]) {
        for &byte in data {
            match self.stage {
                Stage::Error => return,
                Stage::Complete => self.body.push(byte),
                Stage::StartLine | Stage::Headers => self.parse_byte(byte),
            }
        }
    }

    fn parse_byte(&mut self, byte: u8) {
        if byte != LF {
            self.buffer.push(byte);
            if self.buffer.len() > MAX_LINE_LENGTH {
                self.error();
            }
            return;
        }
        if self.buffer.last() == Some(&CR) {
            self.buffer.pop();
        }
        let line = std::mem::take(&mut self.buffer);
        if line.is_empty() {
            if self.stage == Stage::Headers {
                self.stage = Stage::Complete;
            }
            return;
        }
        let line = String::from_utf8_lossy(&line);
        let ok = match self.stage {
            Stage::StartLine => match S::parse(&line) {
                Some(start) => {
                    self.start_line = Some(start);
                    true
                }
                None => false,
            },
            _ => self.header_line(&line),
        };
        if ok {
            self.stage = Stage::Headers;
        } else {
            self.error();
        }
    }

    fn header_line(&mut self, line: &str) -> bool {
        let Some(caps) = header_line_re().and_then(|re| re.captures(line)) else {
            return false;
        };
        let name = normalize_header(&caps[1]);
        let value = caps[2].trim().to_string();
        self.headers.insert(name, value);
        true
    }

    fn error(&mut self) {
        self.stage = Stage::Error;
        self.buffer.clear();
    }

    pub fn start_line(&self) -> Option<&S> {
        self.start_line.as_ref()
    }

    /// Looks up a header by any spelling of its name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&normalize_header(name)).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Bytes that followed the blank line ending the head.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }
}
