//! websocket-driver - a transport-independent WebSocket protocol engine.
//!
//! Hand the driver the bytes read from a socket with `parse`, receive
//! `open`/`message`/`error`/`close` events through listeners, and send data
//! with `text`, `binary`, `ping` and `close`; every outgoing byte goes to the
//! [`Transport`] the driver was built with. No I/O happens here.
//!
//! Supported protocols: RFC 6455 (hybi-13) on both sides, plus the legacy
//! hixie-75 and hixie-76 drafts on the server side.

pub mod driver;
pub mod env;
pub mod error;
pub mod event_emitter;
pub mod events;
pub mod extensions;
pub mod headers;
pub mod http;
pub mod mask;
pub mod options;
pub mod uri;
pub mod utf8;
pub mod ws;

pub use driver::{
    generate_accept, Client, Draft75, Draft76, Driver, Hybi, Proxy, ProxyOutcome, ReadyState,
    Server, Transport,
};
pub use env::{is_websocket_request, Env};
pub use error::{DriverError, ExtensionError, ListenerError, ProtocolError, UrlError};
pub use event_emitter::{EventEmitter, EventType};
pub use events::{CloseEvent, Event, EventKind, MessageData};
pub use extensions::{parse_extension_header, Extension, ExtensionOffer, Extensions};
pub use headers::Headers;
pub use options::DriverOptions;
pub use uri::WsUrl;
pub use ws::{CloseCode, Frame, FrameEncoder, FrameParser, Message, Opcode};
