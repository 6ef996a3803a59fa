//! The hybi-13 client driver.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};

use super::hybi::{generate_accept, Hybi};
use super::proxy::{Proxy, ProxyOutcome};
use super::{ReadyState, Transport};
use crate::env::has_token;
use crate::error::{DriverError, ProtocolError, UrlError};
use crate::events::{CloseEvent, Event};
use crate::headers::Headers;
use crate::http::{HeaderMap, Response};
use crate::options::DriverOptions;
use crate::uri::WsUrl;
use crate::ws::CloseCode;

/// A fresh random `Sec-WebSocket-Key`.
pub fn generate_key() -> String {
    STANDARD.encode(rand::random::<[u8; 16]>())
}

/// Client side of an RFC 6455 connection, optionally tunnelled through an
/// HTTP proxy. Outgoing frames are always masked.
///
/// `start` writes the proxy `CONNECT` request (when a proxy is configured)
/// or the upgrade request; `parse` validates the responses and then hands
/// frame data to the inner [`Hybi`] driver.
#[derive(Debug)]
pub struct Client {
    hybi: Hybi,
    url: WsUrl,
    key: String,
    accept: String,
    http: Response,
    proxy: Option<Proxy>,
    status: Option<u16>,
    headers: HeaderMap,
}

impl Client {
    pub fn new(
        url: &str,
        socket: impl Transport + 'static,
        options: DriverOptions,
    ) -> Result<Self, UrlError> {
        Self::boxed(url, Box::new(socket), options)
    }

    pub(crate) fn boxed(
        url: &str,
        socket: Box<dyn Transport>,
        options: DriverOptions,
    ) -> Result<Self, UrlError> {
        let options = options.with_masking(true);
        let url = WsUrl::parse(url)?;
        let proxy = match &options.proxy {
            Some(proxy) => Some(Proxy::new(WsUrl::parse(proxy)?, url.clone())),
            None => None,
        };
        let ready_state = if proxy.is_some() {
            ReadyState::AwaitingProxy
        } else {
            ReadyState::PreHandshake
        };
        let key = generate_key();
        Ok(Self {
            hybi: Hybi::build(socket, options, ready_state, "hybi-13".to_string()),
            url,
            accept: generate_accept(&key),
            key,
            http: Response::new(),
            proxy,
            status: None,
            headers: HeaderMap::new(),
        })
    }

    pub(crate) fn hybi(&self) -> &Hybi {
        &self.hybi
    }

    pub(crate) fn hybi_mut(&mut self) -> &mut Hybi {
        &mut self.hybi
    }

    pub fn url(&self) -> &WsUrl {
        &self.url
    }

    /// The `Sec-WebSocket-Key` sent with the upgrade request.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Status code of the server's handshake response, once received.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Headers of the server's handshake response, keyed by lowercase name.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Adds a header to the proxy `CONNECT` request. False without a proxy
    /// or once the request has been sent.
    pub fn set_proxy_header(&mut self, name: &str, value: &str) -> bool {
        self.proxy
            .as_mut()
            .is_some_and(|proxy| proxy.set_header(name, value))
    }

    pub fn handshake_request(&mut self) -> String {
        let mut headers = Headers::new();
        headers.set("Host", &self.url.host_header());
        headers.set("Upgrade", "websocket");
        headers.set("Connection", "Upgrade");
        headers.set("Sec-WebSocket-Key", &self.key);
        headers.set("Sec-WebSocket-Version", "13");
        let session = &mut self.hybi.session;
        if !session.protocols.is_empty() {
            headers.set("Sec-WebSocket-Protocol", &session.protocols.join(", "));
        }
        if let Some(auth) = self.url.basic_auth() {
            headers.set("Authorization", &format!("Basic {auth}"));
        }
        if let Some(offer) = session.extensions.generate_offer() {
            headers.set("Sec-WebSocket-Extensions", &offer);
        }
        headers.extend(&session.base.headers);
        format!("GET {} HTTP/1.1\r\n{headers}\r\n", self.url.request_target())
    }

    pub fn start(&mut self) -> Result<bool, DriverError> {
        match self.hybi.ready_state() {
            ReadyState::AwaitingProxy => {
                let Some(request) = self.proxy.as_mut().and_then(Proxy::start) else {
                    return Ok(false);
                };
                self.hybi.session.base.write(&request);
                debug!(target_url = %self.url.as_str(), "proxy CONNECT request sent");
                Ok(true)
            }
            ReadyState::PreHandshake => {
                let request = self.handshake_request();
                self.hybi.session.base.write(request.as_bytes());
                self.hybi.session.base.set_state(ReadyState::Connecting);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
        match self.hybi.ready_state() {
            ReadyState::Closed => Ok(()),
            state if state >= ReadyState::Open => self.hybi.parse(data),
            ReadyState::AwaitingProxy => self.parse_proxy(data),
            _ => {
                self.http.parse(data);
                if self.http.is_error() {
                    return self.fail_handshake("Invalid HTTP response");
                }
                if !self.http.is_complete() {
                    return Ok(());
                }
                let validated = self.validate_handshake();
                if self.hybi.ready_state() == ReadyState::Open {
                    let body = self.http.take_body();
                    return validated.and(self.hybi.parse(&body));
                }
                validated
            }
        }
    }

    fn parse_proxy(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let Some(proxy) = self.proxy.as_mut() else {
            return Ok(());
        };
        match proxy.parse(data) {
            ProxyOutcome::Pending => Ok(()),
            ProxyOutcome::Invalid => self.fail_handshake("Invalid HTTP response"),
            ProxyOutcome::Refused(code) => {
                let message = format!(
                    "Can't establish a connection to the server at {}",
                    self.url.as_str()
                );
                warn!(status = code, reason = %message, "proxy refused connection");
                let base = &mut self.hybi.session.base;
                let errored = base.emit(Event::Error(ProtocolError::new(message)));
                base.set_state(ReadyState::Closed);
                let closed = base.emit(Event::Close(CloseEvent::new(
                    crate::ws::constants::ABNORMAL_CLOSURE,
                    "",
                )));
                errored.and(closed)
            }
            ProxyOutcome::Connected(rest) => {
                debug!("proxy tunnel established");
                self.hybi.session.base.set_state(ReadyState::PreHandshake);
                let connected = self.hybi.session.base.emit(Event::Connect);
                let started = self.start().map(|_| ());
                let result = connected.and(started);
                if rest.is_empty() {
                    result
                } else {
                    result.and(self.parse(&rest))
                }
            }
        }
    }

    fn fail_handshake(&mut self, message: &str) -> Result<(), DriverError> {
        let message = format!("Error during WebSocket handshake: {message}");
        warn!(version = "hybi-13", reason = %message, "handshake failed");
        self.hybi
            .session
            .base
            .fail_locally(CloseCode::ProtocolError.code(), &message)
    }

    fn validate_handshake(&mut self) -> Result<(), DriverError> {
        let code = self.http.code().unwrap_or(0);
        self.status = Some(code);
        self.headers = self.http.headers().clone();

        if code != 101 {
            return self.fail_handshake(&format!("Unexpected response code: {code}"));
        }

        let header = |name| self.http.header(name).unwrap_or("").to_string();
        let upgrade = header("Upgrade");
        let connection = header("Connection");
        let accept = header("Sec-WebSocket-Accept");
        let protocol = header("Sec-WebSocket-Protocol");
        let extensions = header("Sec-WebSocket-Extensions");

        if upgrade.is_empty() {
            return self.fail_handshake("'Upgrade' header is missing");
        }
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return self.fail_handshake("'Upgrade' header value is not 'WebSocket'");
        }
        if connection.is_empty() {
            return self.fail_handshake("'Connection' header is missing");
        }
        if !has_token(&connection, "upgrade") {
            return self.fail_handshake("'Connection' header value is not 'Upgrade'");
        }
        if accept != self.accept {
            return self.fail_handshake("Sec-WebSocket-Accept mismatch");
        }

        if !protocol.is_empty() {
            if !self.hybi.session.protocols.contains(&protocol) {
                return self.fail_handshake("Sec-WebSocket-Protocol mismatch");
            }
            self.hybi.session.protocol = Some(protocol);
        }

        if !extensions.is_empty() {
            let session = &mut self.hybi.session;
            if !session.extensions.has_offers() {
                return self.fail_handshake("Sec-WebSocket-Extensions mismatch");
            }
            if let Err(err) = session.extensions.activate(&extensions) {
                return self.fail_handshake(&err.message);
            }
        }

        debug!(version = "hybi-13", "handshake complete");
        self.hybi.session.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_random_and_well_formed() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(&a).unwrap().len(), 16);
    }

    #[test]
    fn rejects_bad_urls_before_any_io() {
        let err = Client::new("stream.wikimedia.org/rc", |_: &[u8]| {}, DriverOptions::new())
            .unwrap_err();
        assert!(matches!(err, UrlError::Parse(..)));

        let err = Client::new(
            "ws://www.example.com/",
            |_: &[u8]| {},
            DriverOptions::new().with_proxy("not a url"),
        )
        .unwrap_err();
        assert!(matches!(err, UrlError::Parse(..)));
    }
}
