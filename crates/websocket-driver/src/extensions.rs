//! Extension hook and the `Sec-WebSocket-Extensions` header codec.
//!
//! An [`Extension`] transforms messages on their way in and out (for
//! example compression) and may claim RSV bits. [`Extensions`] keeps the
//! registered set, negotiates which of them are active and runs messages
//! through the active ones.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ExtensionError;
use crate::ws::{Frame, Message};

const TOKEN: &str = r"[!#$%&'*+\-.^_`|~0-9A-Za-z]+";
const QUOTED: &str = r#""(?:\\.|[^"\\])*""#;

fn param_pattern() -> String {
    format!(r"(?:\s*;\s*{TOKEN}(?:\s*=\s*(?:{TOKEN}|{QUOTED}))?)")
}

fn list_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        let ext = format!("{TOKEN}{}*", param_pattern());
        Regex::new(&format!(r"^\s*{ext}(?:\s*,\s*{ext})*\s*$")).ok()
    })
    .as_ref()
}

fn ext_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"({TOKEN})({}*)", param_pattern())).ok())
        .as_ref()
}

fn param_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r";\s*({TOKEN})(?:\s*=\s*({TOKEN}|{QUOTED}))?")).ok()
    })
    .as_ref()
}

fn token_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("^{TOKEN}$")).ok())
        .as_ref()
}

/// One element of a `Sec-WebSocket-Extensions` list: a name plus its
/// parameters in order. A parameter without `=` has no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOffer {
    pub name: String,
    pub params: Vec<(String, Option<String>)>,
}

impl ExtensionOffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.params.push((key.into(), value.map(str::to_string)));
        self
    }

    pub fn param(&self, key: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }
}

impl fmt::Display for ExtensionOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.params {
            write!(f, "; {key}")?;
            let Some(value) = value else {
                continue;
            };
            if token_re().is_some_and(|re| re.is_match(value)) {
                write!(f, "={value}")?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "=\"{escaped}\"")?;
            }
        }
        Ok(())
    }
}

/// Parses a `Sec-WebSocket-Extensions` header value.
pub fn parse_extension_header(header: &str) -> Result<Vec<ExtensionOffer>, ExtensionError> {
    let invalid = || ExtensionError::new(format!("Invalid Sec-WebSocket-Extensions header: {header}"));
    let (Some(list), Some(ext), Some(param)) = (list_re(), ext_re(), param_re()) else {
        return Err(invalid());
    };
    if !list.is_match(header) {
        return Err(invalid());
    }
    let offers = ext
        .captures_iter(header)
        .map(|caps| {
            let params = param
                .captures_iter(&caps[2])
                .map(|p| (p[1].to_string(), p.get(2).map(|v| unquote(v.as_str()))))
                .collect();
            ExtensionOffer {
                name: caps[1].to_string(),
                params,
            }
        })
        .collect();
    Ok(offers)
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A message transform negotiated during the handshake.
pub trait Extension: Send {
    /// Registered extension name, e.g. `permessage-deflate`.
    fn name(&self) -> &str;

    /// True if this extension gives meaning to the given RSV bits.
    fn handles(&self, rsv1: bool, rsv2: bool, rsv3: bool) -> bool;

    /// Client side: the parameters to offer, or `None` to offer nothing.
    fn generate_offer(&mut self) -> Option<ExtensionOffer> {
        None
    }

    /// Client side: accepts the server's response parameters.
    fn activate(&mut self, _response: &ExtensionOffer) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Server side: picks one of the client's offers for this extension and
    /// returns the response parameters, or `None` to decline.
    fn generate_response(
        &mut self,
        offers: &[ExtensionOffer],
    ) -> Result<Option<ExtensionOffer>, ExtensionError>;

    fn process_incoming_message(&mut self, message: Message) -> Result<Message, ExtensionError>;

    fn process_outgoing_message(&mut self, message: Message) -> Result<Message, ExtensionError>;

    /// Releases per-connection resources once the connection has closed.
    fn close(&mut self) {}
}

/// The extensions registered on one driver and the subset that is active.
#[derive(Default)]
pub struct Extensions {
    registered: Vec<Box<dyn Extension>>,
    offered: Vec<usize>,
    active: Vec<usize>,
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.registered.iter().map(|e| e.name()).collect();
        f.debug_struct("Extensions")
            .field("registered", &names)
            .field("active", &self.active)
            .finish()
    }
}

fn claimed_bits(ext: &dyn Extension) -> [bool; 3] {
    [
        ext.handles(true, false, false),
        ext.handles(false, true, false),
        ext.handles(false, false, true),
    ]
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, extension: Box<dyn Extension>) {
        self.registered.push(extension);
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Names of the active extensions, in activation order.
    pub fn active_names(&self) -> Vec<&str> {
        self.active
            .iter()
            .map(|&i| self.registered[i].name())
            .collect()
    }

    fn active_bits(&self) -> [bool; 3] {
        self.active.iter().fold([false; 3], |acc, &i| {
            let bits = claimed_bits(self.registered[i].as_ref());
            [acc[0] || bits[0], acc[1] || bits[1], acc[2] || bits[2]]
        })
    }

    fn conflicts(&self, index: usize) -> bool {
        let taken = self.active_bits();
        let wanted = claimed_bits(self.registered[index].as_ref());
        (0..3).any(|i| taken[i] && wanted[i])
    }

    /// Client side: the request header value offering every extension that
    /// has something to offer.
    pub fn generate_offer(&mut self) -> Option<String> {
        self.offered.clear();
        let mut parts = Vec::new();
        for (index, ext) in self.registered.iter_mut().enumerate() {
            if let Some(offer) = ext.generate_offer() {
                self.offered.push(index);
                parts.push(offer.to_string());
            }
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    /// True if [`generate_offer`](Self::generate_offer) offered anything.
    pub fn has_offers(&self) -> bool {
        !self.offered.is_empty()
    }

    /// Client side: activates the extensions named in the server response.
    pub fn activate(&mut self, header: &str) -> Result<(), ExtensionError> {
        for response in parse_extension_header(header)? {
            let index = self
                .offered
                .iter()
                .copied()
                .find(|&i| self.registered[i].name() == response.name)
                .ok_or_else(|| {
                    ExtensionError::new(format!(
                        "Server sent an extension response for unknown extension \"{}\"",
                        response.name
                    ))
                })?;
            if self.active.contains(&index) {
                return Err(ExtensionError::new(format!(
                    "Server sent two extension responses for \"{}\"",
                    response.name
                )));
            }
            if self.conflicts(index) {
                return Err(ExtensionError::new(format!(
                    "Server sent two extension responses that use the same RSV bit: \"{}\"",
                    response.name
                )));
            }
            self.registered[index].activate(&response)?;
            self.active.push(index);
        }
        Ok(())
    }

    /// Server side: answers the client's offer and activates the accepted
    /// extensions. Returns the response header value, if any.
    pub fn generate_response_header(
        &mut self,
        offered: Option<&str>,
    ) -> Result<Option<String>, ExtensionError> {
        let Some(header) = offered else {
            return Ok(None);
        };
        let offers = parse_extension_header(header)?;
        let mut parts = Vec::new();
        for index in 0..self.registered.len() {
            let name = self.registered[index].name().to_string();
            let matching: Vec<ExtensionOffer> =
                offers.iter().filter(|o| o.name == name).cloned().collect();
            if matching.is_empty() || self.conflicts(index) {
                continue;
            }
            if let Some(response) = self.registered[index].generate_response(&matching)? {
                self.active.push(index);
                parts.push(response.to_string());
            }
        }
        Ok((!parts.is_empty()).then(|| parts.join(", ")))
    }

    /// True if every RSV bit set on `frame` is claimed by an active
    /// extension. Control frames may never carry RSV bits.
    pub fn valid_frame_rsv(&self, frame: &Frame) -> bool {
        if !(frame.rsv1 || frame.rsv2 || frame.rsv3) {
            return true;
        }
        if frame.opcode.is_control() {
            return false;
        }
        let allowed = self.active_bits();
        (allowed[0] || !frame.rsv1) && (allowed[1] || !frame.rsv2) && (allowed[2] || !frame.rsv3)
    }

    /// Runs an incoming message through the active extensions, last first.
    pub fn process_incoming_message(&mut self, mut message: Message) -> Result<Message, ExtensionError> {
        for &index in self.active.iter().rev() {
            message = self.registered[index].process_incoming_message(message)?;
        }
        Ok(message)
    }

    /// Runs an outgoing message through the active extensions in order.
    pub fn process_outgoing_message(&mut self, mut message: Message) -> Result<Message, ExtensionError> {
        for &index in &self.active {
            message = self.registered[index].process_outgoing_message(message)?;
        }
        Ok(message)
    }

    pub fn close(&mut self) {
        for &index in &self.active {
            self.registered[index].close();
        }
    }
}
