use std::sync::OnceLock;

use regex::Regex;

use super::parser::{HttpParser, StartLine};
use crate::env::{header_key, Env};

fn request_line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(OPTIONS|GET|HEAD|POST|PUT|DELETE|TRACE|CONNECT|PATCH)\s+([\x21-\x7e]+)\s+HTTP/([0-9]+)\.([0-9]+)$",
        )
        .ok()
    })
    .as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: (u32, u32),
}

impl StartLine for RequestLine {
    fn parse(line: &str) -> Option<Self> {
        let caps = request_line_re()?.captures(line)?;
        Some(Self {
            method: caps[1].to_string(),
            target: caps[2].to_string(),
            version: (caps[3].parse().ok()?, caps[4].parse().ok()?),
        })
    }
}

/// Parser for an incoming upgrade request.
pub type Request = HttpParser<RequestLine>;

impl HttpParser<RequestLine> {
    /// Builds the request environment; `None` until the head is complete.
    pub fn env(&self) -> Option<Env> {
        if !self.is_complete() {
            return None;
        }
        let line = self.start_line()?;
        let (path, query) = match line.target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (line.target.as_str(), ""),
        };
        let mut env = Env::new()
            .with("REQUEST_METHOD", line.method.as_str())
            .with("SCRIPT_NAME", "")
            .with("PATH_INFO", path)
            .with("QUERY_STRING", query)
            .with_body(self.body().to_vec());

        if let Some(host) = self.header("Host") {
            let (name, port) = match host.rsplit_once(':') {
                Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => (name, port),
                _ => (host, "80"),
            };
            env.set("SERVER_NAME", name);
            env.set("SERVER_PORT", port);
        }
        for (name, value) in self.headers() {
            env.set(header_key(name), value.as_str());
        }
        Some(env)
    }
}
