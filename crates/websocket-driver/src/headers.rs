//! Outgoing handshake header lines.

use std::collections::BTreeSet;

use crate::http::normalize_header;

/// Headers that may legitimately appear more than once.
const ALLOWED_DUPLICATES: [&str; 4] = ["set-cookie", "set-cookie2", "warning", "www-authenticate"];

/// Ordered header lines for a handshake request or response.
///
/// A second header with the same normalized name is dropped unless the name
/// is one of the few HTTP allows to repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    sent: BTreeSet<String>,
    lines: Vec<String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name: value`; returns false if the header was dropped.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        let key = normalize_header(name);
        let first = self.sent.insert(key.clone());
        if !first && !ALLOWED_DUPLICATES.contains(&key.as_str()) {
            return false;
        }
        self.lines
            .push(format!("{}: {}\r\n", name.trim(), value.trim()));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sent.contains(&normalize_header(name))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Appends every line of `other` under the usual duplicate rules.
    pub fn extend(&mut self, other: &Headers) {
        for line in &other.lines {
            if let Some((name, value)) = line.trim_end().split_once(": ") {
                self.set(name, value);
            }
        }
    }
}

impl std::fmt::Display for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}
