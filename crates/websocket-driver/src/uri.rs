//! Target and proxy URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

use crate::error::UrlError;

/// A parsed `ws`, `wss`, `http` or `https` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
    raw: String,
    url: Url,
}

impl WsUrl {
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw).map_err(|err| UrlError::Parse(raw.to_string(), err))?;
        if !matches!(url.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(UrlError::UnsupportedScheme(raw.to_string()));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::MissingHost(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// The URL exactly as it was given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// The port written in the URL, if it is not the scheme's default.
    pub fn explicit_port(&self) -> Option<u16> {
        self.url.port()
    }

    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or_else(|| self.default_port())
    }

    fn default_port(&self) -> u16 {
        match self.scheme() {
            "wss" | "https" => 443,
            _ => 80,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.scheme(), "wss" | "https")
    }

    /// `host` or `host:port` for a `Host` header.
    pub fn host_header(&self) -> String {
        match self.explicit_port() {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_string(),
        }
    }

    /// Path and query for a request line; the path is never empty.
    pub fn request_target(&self) -> String {
        let path = match self.url.path() {
            "" => "/",
            path => path,
        };
        match self.url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }

    /// Base64 `user:password` credentials, if the URL carries any.
    pub fn basic_auth(&self) -> Option<String> {
        let user = self.url.username();
        if user.is_empty() {
            return None;
        }
        let password = self.url.password().unwrap_or("");
        Some(STANDARD.encode(format!("{user}:{password}")))
    }
}
