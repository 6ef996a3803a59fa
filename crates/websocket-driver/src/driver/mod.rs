//! Connection drivers: the handshake, the ready-state machine and the
//! outgoing queue for each protocol variant.
//!
//! [`Driver`] is the closed set of variants a connection can end up with.
//! Use [`Driver::client`] for outgoing connections, [`Driver::server`] to
//! parse a raw upgrade request, or [`Driver::rack`] when the request has
//! already been parsed into an [`Env`].

mod base;
pub mod client;
pub mod draft75;
pub mod draft76;
mod hixie;
pub mod hybi;
pub mod proxy;
pub mod server;

pub use client::Client;
pub use draft75::Draft75;
pub use draft76::Draft76;
pub use hybi::{generate_accept, Hybi, PingCallback};
pub use proxy::{Proxy, ProxyOutcome};
pub use server::Server;

use crate::env::Env;
use crate::error::{DriverError, ListenerError, UrlError};
use crate::event_emitter::EventEmitter;
use crate::events::{Event, EventKind, MessageData};
use crate::extensions::Extension;
use crate::options::DriverOptions;
use crate::ws::Opcode;

/// Where outgoing bytes go. Any `FnMut(&[u8])` closure is a transport.
pub trait Transport: Send {
    fn write(&mut self, data: &[u8]);
}

impl<F> Transport for F
where
    F: FnMut(&[u8]) + Send,
{
    fn write(&mut self, data: &[u8]) {
        self(data)
    }
}

/// Connection state. Only `Connecting` through `Closed` are visible to
/// WebSocket API users; the negative states belong to the client handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum ReadyState {
    /// Waiting for the proxy to accept a `CONNECT` request.
    AwaitingProxy = -2,
    /// The upgrade request has not been sent yet.
    PreHandshake = -1,
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub const fn code(self) -> i8 {
        self as i8
    }

    /// `connecting`, `open`, `closing` or `closed`; `None` before the
    /// upgrade request is sent.
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::AwaitingProxy | Self::PreHandshake => None,
            Self::Connecting => Some("connecting"),
            Self::Open => Some("open"),
            Self::Closing => Some("closing"),
            Self::Closed => Some("closed"),
        }
    }
}

/// A connection of one of the supported protocol variants.
#[derive(Debug)]
pub enum Driver {
    Hybi(Hybi),
    Client(Client),
    Draft75(Draft75),
    Draft76(Draft76),
}

impl Driver {
    /// Client connection to `url`. Outgoing frames are always masked.
    pub fn client(
        url: &str,
        socket: impl Transport + 'static,
        options: DriverOptions,
    ) -> Result<Self, UrlError> {
        Client::new(url, socket, options).map(Self::Client)
    }

    /// Server connection that parses the upgrade request itself. Incoming
    /// hybi frames must be masked.
    pub fn server(socket: impl Transport + 'static, options: DriverOptions) -> Server {
        Server::new(socket, options.with_require_masking(true))
    }

    /// Server connection for an already-parsed upgrade request, picking the
    /// variant from its headers.
    pub fn rack(env: Env, socket: impl Transport + 'static, options: DriverOptions) -> Self {
        Self::rack_boxed(env, Box::new(socket), options)
    }

    pub(crate) fn rack_boxed(env: Env, socket: Box<dyn Transport>, options: DriverOptions) -> Self {
        if env.header("Sec-WebSocket-Version").is_some() {
            Self::Hybi(Hybi::server(env, socket, options.with_require_masking(true)))
        } else if env.header("Sec-WebSocket-Key1").is_some() {
            Self::Draft76(Draft76::boxed(env, socket, options))
        } else {
            Self::Draft75(Draft75::boxed(env, socket, options))
        }
    }

    pub(crate) fn emitter_mut(&mut self) -> &mut EventEmitter<Event> {
        match self {
            Self::Hybi(d) => &mut d.session.base.emitter,
            Self::Client(d) => &mut d.hybi_mut().session.base.emitter,
            Self::Draft75(d) => &mut d.hixie.base.emitter,
            Self::Draft76(d) => &mut d.hixie.base.emitter,
        }
    }

    /// Registers a listener; returns an id for [`remove_listener`](Self::remove_listener).
    ///
    /// Listeners see only the event, never the driver, so they cannot send
    /// frames or feed input while dispatch runs. Messages meant to go out on
    /// `open` should be queued with `text`/`binary` before `start`; they are
    /// flushed ahead of the `open` event.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> u64
    where
        F: FnMut(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.emitter_mut().on(kind, listener)
    }

    pub fn remove_listener(&mut self, kind: EventKind, listener_id: u64) -> bool {
        self.emitter_mut().remove_listener(kind, listener_id)
    }

    pub fn remove_all_listeners(&mut self, kind: Option<EventKind>) {
        self.emitter_mut().remove_all_listeners(kind)
    }

    pub fn state(&self) -> ReadyState {
        match self {
            Self::Hybi(d) => d.ready_state(),
            Self::Client(d) => d.hybi().ready_state(),
            Self::Draft75(d) => d.ready_state(),
            Self::Draft76(d) => d.ready_state(),
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Hybi(d) => d.version(),
            Self::Client(d) => d.hybi().version(),
            Self::Draft75(d) => d.version(),
            Self::Draft76(d) => d.version(),
        }
    }

    /// Negotiated subprotocol; always `None` for the hixie drafts.
    pub fn protocol(&self) -> Option<&str> {
        match self {
            Self::Hybi(d) => d.protocol(),
            Self::Client(d) => d.hybi().protocol(),
            Self::Draft75(_) | Self::Draft76(_) => None,
        }
    }

    /// The upgrade request this server-side driver answers.
    pub fn env(&self) -> Option<&Env> {
        match self {
            Self::Hybi(d) => d.env(),
            Self::Client(_) => None,
            Self::Draft75(d) => Some(d.env()),
            Self::Draft76(d) => Some(d.env()),
        }
    }

    pub fn add_extension(&mut self, extension: Box<dyn Extension>) -> bool {
        match self {
            Self::Hybi(d) => d.add_extension(extension),
            Self::Client(d) => d.hybi_mut().add_extension(extension),
            Self::Draft75(_) | Self::Draft76(_) => false,
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match self {
            Self::Hybi(d) => d.set_header(name, value),
            Self::Client(d) => d.hybi_mut().set_header(name, value),
            Self::Draft75(d) => d.set_header(name, value),
            Self::Draft76(d) => d.set_header(name, value),
        }
    }

    pub fn start(&mut self) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.start(),
            Self::Client(d) => d.start(),
            Self::Draft75(d) => d.start(),
            Self::Draft76(d) => d.start(),
        }
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
        match self {
            Self::Hybi(d) => d.parse(data),
            Self::Client(d) => d.parse(data),
            Self::Draft75(d) => d.parse(data),
            Self::Draft76(d) => d.parse(data),
        }
    }

    pub fn text(&mut self, message: &str) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.text(message),
            Self::Client(d) => d.hybi_mut().text(message),
            Self::Draft75(d) => d.text(message),
            Self::Draft76(d) => d.text(message),
        }
    }

    /// False on the hixie drafts, which only carry text.
    pub fn binary(&mut self, message: &[u8]) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.binary(message),
            Self::Client(d) => d.hybi_mut().binary(message),
            Self::Draft75(_) | Self::Draft76(_) => Ok(false),
        }
    }

    pub fn ping(&mut self, payload: &[u8]) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.ping(payload),
            Self::Client(d) => d.hybi_mut().ping(payload),
            Self::Draft75(_) | Self::Draft76(_) => Ok(false),
        }
    }

    pub fn ping_with_callback<F>(&mut self, payload: &[u8], callback: F) -> Result<bool, DriverError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Hybi(d) => d.ping_with_callback(payload, callback),
            Self::Client(d) => d.hybi_mut().ping_with_callback(payload, callback),
            Self::Draft75(_) | Self::Draft76(_) => Ok(false),
        }
    }

    pub fn pong(&mut self, payload: &[u8]) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.pong(payload),
            Self::Client(d) => d.hybi_mut().pong(payload),
            Self::Draft75(_) | Self::Draft76(_) => Ok(false),
        }
    }

    /// Starts the closing handshake. The hixie drafts ignore `reason` and
    /// `code` and close at once.
    pub fn close(&mut self, reason: Option<&str>, code: Option<u16>) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.close(reason, code),
            Self::Client(d) => d.hybi_mut().close(reason, code),
            Self::Draft75(d) => d.close(),
            Self::Draft76(d) => d.close(),
        }
    }

    pub fn frame(
        &mut self,
        data: MessageData,
        opcode: Option<Opcode>,
        code: Option<u16>,
    ) -> Result<bool, DriverError> {
        match self {
            Self::Hybi(d) => d.frame(data, opcode, code),
            Self::Client(d) => d.hybi_mut().frame(data, opcode, code),
            Self::Draft75(d) => d.frame(data, opcode, code),
            Self::Draft76(d) => d.frame(data, opcode, code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_order_and_names() {
        assert!(ReadyState::AwaitingProxy < ReadyState::PreHandshake);
        assert!(ReadyState::Connecting < ReadyState::Open);
        assert_eq!(ReadyState::PreHandshake.code(), -1);
        assert_eq!(ReadyState::PreHandshake.name(), None);
        assert_eq!(ReadyState::Closing.name(), Some("closing"));
    }

    #[test]
    fn rack_selects_variant_by_headers() {
        let sink = |_: &[u8]| {};
        let hybi = Env::new().with_header("Sec-WebSocket-Version", "13");
        let draft76 = Env::new().with_header("Sec-WebSocket-Key1", "1 2");
        assert_eq!(Driver::rack(hybi, sink, DriverOptions::new()).version(), "hybi-13");
        assert_eq!(Driver::rack(draft76, sink, DriverOptions::new()).version(), "hixie-76");
        assert_eq!(Driver::rack(Env::new(), sink, DriverOptions::new()).version(), "hixie-75");
    }
}
