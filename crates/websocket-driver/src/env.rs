//! Server-side request environment.

use std::collections::BTreeMap;

/// The upgrade request a server-side driver answers, in rack/CGI form.
///
/// Headers live under `HTTP_<NAME>` keys with dashes turned into
/// underscores; request metadata uses `REQUEST_METHOD`, `PATH_INFO` and
/// `QUERY_STRING`. `body` holds any bytes that arrived after the head, which
/// the hixie-76 handshake needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    vars: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Converts a header name to its `HTTP_` environment key.
pub fn header_key(name: &str) -> String {
    format!("HTTP_{}", name.trim().to_ascii_uppercase().replace('-', "_"))
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Env::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder that stores `value` under the `HTTP_` key for header `name`.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(header_key(name), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Looks up a request header by its HTTP name, e.g. `Sec-WebSocket-Key`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.get(&header_key(name))
    }

    pub fn request_method(&self) -> Option<&str> {
        self.get("REQUEST_METHOD")
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// The `ws://` URL the request was made to.
    pub fn url(&self) -> String {
        let host = self.header("Host").unwrap_or("");
        let path = self.get("PATH_INFO").unwrap_or("");
        let mut url = format!("ws://{host}{path}");
        if let Some(query) = self.get("QUERY_STRING").filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// True if `env` describes a WebSocket upgrade request.
///
/// Requires a `GET`, an `upgrade` token in `Connection` and an `Upgrade`
/// header equal to `websocket`, both compared case-insensitively.
pub fn is_websocket_request(env: &Env) -> bool {
    let connection = env.header("Connection").unwrap_or("");
    let upgrade = env.header("Upgrade").unwrap_or("");
    env.request_method() == Some("GET")
        && has_token(connection, "upgrade")
        && upgrade.eq_ignore_ascii_case("websocket")
}

/// True if the comma-separated header `value` contains `token`.
pub(crate) fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}
