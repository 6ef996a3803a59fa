//! RFC 6455 (hybi-13) driver.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use tracing::{debug, trace, warn};

use super::base::Base;
use super::{ReadyState, Transport};
use crate::env::Env;
use crate::error::{DriverError, ProtocolError};
use crate::events::{Event, MessageData};
use crate::extensions::{Extension, Extensions};
use crate::headers::Headers;
use crate::options::DriverOptions;
use crate::utf8;
use crate::ws::constants::GUID;
use crate::ws::{CloseCode, Frame, FrameEncoder, FrameHandler, FrameParser, Message, Opcode};

/// Callback run when the pong answering a ping arrives.
pub type PingCallback = Box<dyn FnOnce() + Send>;

/// `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
pub fn generate_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Everything a hybi connection owns apart from the frame parser.
///
/// Kept separate so the parser can borrow it mutably as its handler.
pub(crate) struct Session {
    pub base: Base,
    pub extensions: Extensions,
    encoder: FrameEncoder,
    masking: bool,
    pub protocols: Vec<String>,
    pub protocol: Option<String>,
    ping_callbacks: HashMap<Vec<u8>, PingCallback>,
    env: Option<Env>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base", &self.base)
            .field("extensions", &self.extensions)
            .field("masking", &self.masking)
            .field("protocol", &self.protocol)
            .field("ping_callbacks", &self.ping_callbacks.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    fn is_open(&self) -> bool {
        self.base.ready_state == ReadyState::Open
    }

    pub fn frame(
        &mut self,
        data: MessageData,
        opcode: Option<Opcode>,
        code: Option<u16>,
    ) -> Result<bool, DriverError> {
        if self.base.ready_state <= ReadyState::Connecting {
            return Ok(self.base.enqueue(data, opcode, code));
        }
        if !self.is_open() {
            return Ok(false);
        }

        let opcode = opcode.unwrap_or(match data {
            MessageData::Text(_) => Opcode::Text,
            MessageData::Binary(_) => Opcode::Binary,
        });
        let body = match data {
            MessageData::Text(text) => text.into_bytes(),
            MessageData::Binary(bytes) => bytes,
        };
        let payload = match code {
            Some(code) => {
                let mut payload = Vec::with_capacity(2 + body.len());
                payload.extend_from_slice(&code.to_be_bytes());
                payload.extend_from_slice(&body);
                payload
            }
            None => body,
        };

        let mut message = Message::new(opcode, payload);
        if opcode.is_message() {
            message = match self.extensions.process_outgoing_message(message) {
                Ok(message) => message,
                Err(err) => {
                    self.fail(CloseCode::ExtensionError, err.message)?;
                    return Ok(false);
                }
            };
        }

        let mut frame =
            Frame::new(message.opcode, message.data).with_rsv(message.rsv1, message.rsv2, message.rsv3);
        if self.masking {
            frame = frame.with_masking_key(rand::random());
        }
        trace!(
            opcode = frame.opcode as u8,
            length = frame.length,
            masked = frame.masked,
            "frame encoded"
        );
        let bytes = self.encoder.encode(&frame);
        self.base.write(&bytes);
        Ok(true)
    }

    pub fn open(&mut self) -> Result<(), DriverError> {
        self.base.set_state(ReadyState::Open);
        let mut result = Ok(());
        while let Some(queued) = self.base.queue.pop_front() {
            let sent = self.frame(queued.data, queued.opcode, queued.code);
            result = result.and(sent.map(|_| ()));
        }
        result.and(self.base.emit(Event::Open))
    }

    pub fn close(&mut self, reason: Option<&str>, code: Option<u16>) -> Result<bool, DriverError> {
        let reason = reason.unwrap_or("");
        let code = code.unwrap_or(CloseCode::NormalClosure.code());
        match self.base.ready_state {
            state if state <= ReadyState::Connecting => {
                self.base.finalize(code, reason)?;
                Ok(true)
            }
            ReadyState::Open => {
                self.frame(MessageData::Text(reason.to_string()), Some(Opcode::Close), Some(code))?;
                self.base.set_state(ReadyState::Closing);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn ping(&mut self, payload: &[u8], callback: Option<PingCallback>) -> Result<bool, DriverError> {
        if self.base.ready_state > ReadyState::Open {
            return Ok(false);
        }
        if let Some(callback) = callback {
            self.ping_callbacks.insert(payload.to_vec(), callback);
        }
        self.frame(MessageData::Binary(payload.to_vec()), Some(Opcode::Ping), None)
    }

    /// Sends a close frame if the connection is open, then moves to CLOSED
    /// and emits `close`.
    fn shutdown(&mut self, code: u16, reason: &str) -> Result<(), DriverError> {
        let mut result = Ok(());
        if self.is_open() {
            result = self
                .frame(MessageData::Text(reason.to_string()), Some(Opcode::Close), Some(code))
                .map(|_| ());
        }
        self.ping_callbacks.clear();
        self.base.set_state(ReadyState::Closed);
        let closed = self.base.emit(Event::Close(crate::events::CloseEvent::new(code, reason)));
        self.extensions.close();
        result.and(closed)
    }

    pub fn fail(&mut self, code: CloseCode, message: String) -> Result<(), DriverError> {
        if self.base.ready_state == ReadyState::Closed {
            return Ok(());
        }
        warn!(code = code.code(), reason = %message, "connection failed");
        let errored = self
            .base
            .emit(Event::Error(ProtocolError::with_code(message.clone(), code)));
        let closed = self.shutdown(code.code(), &message);
        errored.and(closed)
    }

    /// The 101 response, or `None` if the extension offer was rejected and
    /// the connection failed.
    fn handshake_response(&mut self) -> Result<Option<Vec<u8>>, DriverError> {
        let Some(env) = self.env.as_ref() else {
            return Ok(None);
        };
        let accept = generate_accept(env.header("Sec-WebSocket-Key").unwrap_or(""));
        let offered = env.header("Sec-WebSocket-Extensions").map(str::to_string);

        let extensions = match self.extensions.generate_response_header(offered.as_deref()) {
            Ok(extensions) => extensions,
            Err(err) => {
                self.fail(CloseCode::ProtocolError, err.message)?;
                return Ok(None);
            }
        };

        let mut headers = Headers::new();
        headers.set("Upgrade", "websocket");
        headers.set("Connection", "Upgrade");
        headers.set("Sec-WebSocket-Accept", &accept);
        if let Some(protocol) = &self.protocol {
            headers.set("Sec-WebSocket-Protocol", protocol);
        }
        if let Some(extensions) = &extensions {
            headers.set("Sec-WebSocket-Extensions", extensions);
        }
        headers.extend(&self.base.headers);
        Ok(Some(
            format!("HTTP/1.1 101 Switching Protocols\r\n{headers}\r\n").into_bytes(),
        ))
    }
}

impl FrameHandler for Session {
    fn valid_frame_rsv(&self, frame: &Frame) -> bool {
        self.extensions.valid_frame_rsv(frame)
    }

    fn handle_message(&mut self, message: Message) -> Result<(), DriverError> {
        let message = match self.extensions.process_incoming_message(message) {
            Ok(message) => message,
            Err(err) => return self.fail(CloseCode::ExtensionError, err.message),
        };
        let data = match message.opcode {
            Opcode::Binary => MessageData::Binary(message.data),
            _ => match utf8::decode(message.data) {
                Some(text) => MessageData::Text(text),
                None => {
                    return self.fail(
                        CloseCode::EncodingError,
                        "Could not decode a text frame as UTF-8".to_string(),
                    )
                }
            },
        };
        self.base.emit(Event::Message(data))
    }

    fn handle_close(&mut self, code: u16, reason: String) -> Result<(), DriverError> {
        debug!(code, reason = %reason, "close frame received");
        self.shutdown(code, &reason)
    }

    fn handle_ping(&mut self, payload: Vec<u8>) -> Result<(), DriverError> {
        self.frame(MessageData::Binary(payload), Some(Opcode::Pong), None)
            .map(|_| ())
    }

    fn handle_pong(&mut self, payload: Vec<u8>) -> Result<(), DriverError> {
        if let Some(callback) = self.ping_callbacks.remove(&payload) {
            callback();
        }
        Ok(())
    }

    fn handle_error(&mut self, code: CloseCode, message: String) -> Result<(), DriverError> {
        self.fail(code, message)
    }

    fn is_closed(&self) -> bool {
        self.base.ready_state == ReadyState::Closed
    }
}

/// Driver for the RFC 6455 protocol.
///
/// Built by [`Driver::rack`](super::Driver::rack) for server connections and
/// wrapped by [`Client`](super::Client) on the client side.
#[derive(Debug)]
pub struct Hybi {
    pub(crate) parser: FrameParser,
    pub(crate) session: Session,
}

impl Hybi {
    /// Server-side driver answering the upgrade request in `env`.
    pub fn new(env: Env, socket: impl Transport + 'static, options: DriverOptions) -> Self {
        Self::server(env, Box::new(socket), options)
    }

    pub(crate) fn server(env: Env, socket: Box<dyn Transport>, options: DriverOptions) -> Self {
        let version = format!("hybi-{}", env.header("Sec-WebSocket-Version").unwrap_or(""));
        let mut hybi = Self::build(socket, options, ReadyState::Connecting, version);
        let session = &mut hybi.session;
        session.protocol = env.header("Sec-WebSocket-Protocol").and_then(|offered| {
            offered
                .split(',')
                .map(str::trim)
                .find(|p| session.protocols.iter().any(|supported| supported == p))
                .map(str::to_string)
        });
        session.env = Some(env);
        hybi
    }

    pub(crate) fn build(
        socket: Box<dyn Transport>,
        options: DriverOptions,
        ready_state: ReadyState,
        version: String,
    ) -> Self {
        let parser = FrameParser::new()
            .with_max_length(options.max_length)
            .with_require_masking(options.require_masking)
            .with_buffer_limit(options.max_buffer_size);
        let session = Session {
            extensions: Extensions::new(),
            encoder: FrameEncoder::new(),
            masking: options.masking,
            protocols: options.protocols.clone(),
            protocol: None,
            ping_callbacks: HashMap::new(),
            env: None,
            base: Base::new(socket, options, ready_state, version),
        };
        Self { parser, session }
    }

    pub fn version(&self) -> &str {
        &self.session.base.version
    }

    pub fn ready_state(&self) -> ReadyState {
        self.session.base.ready_state
    }

    /// Negotiated subprotocol, if any.
    pub fn protocol(&self) -> Option<&str> {
        self.session.protocol.as_deref()
    }

    pub fn env(&self) -> Option<&Env> {
        self.session.env.as_ref()
    }

    pub fn add_extension(&mut self, extension: Box<dyn Extension>) -> bool {
        self.session.extensions.add(extension);
        true
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        self.session.base.set_header(name, value)
    }

    /// Writes the handshake response and opens the connection.
    pub fn start(&mut self) -> Result<bool, DriverError> {
        if self.session.base.ready_state != ReadyState::Connecting {
            return Ok(false);
        }
        let Some(response) = self.session.handshake_response()? else {
            return Ok(false);
        };
        self.session.base.write(&response);
        debug!(version = %self.session.base.version, "handshake response sent");
        self.session.open()?;
        Ok(true)
    }

    /// Feeds bytes received from the peer.
    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
        if self.session.base.ready_state == ReadyState::Closed {
            return Ok(());
        }
        self.parser.parse(data, &mut self.session)
    }

    pub fn text(&mut self, message: &str) -> Result<bool, DriverError> {
        self.frame(MessageData::Text(message.to_string()), None, None)
    }

    pub fn binary(&mut self, message: &[u8]) -> Result<bool, DriverError> {
        self.frame(MessageData::Binary(message.to_vec()), None, None)
    }

    pub fn ping(&mut self, payload: &[u8]) -> Result<bool, DriverError> {
        self.session.ping(payload, None)
    }

    /// Sends a ping and runs `callback` once a pong with the same payload
    /// arrives.
    pub fn ping_with_callback<F>(&mut self, payload: &[u8], callback: F) -> Result<bool, DriverError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.session.ping(payload, Some(Box::new(callback)))
    }

    pub fn pong(&mut self, payload: &[u8]) -> Result<bool, DriverError> {
        self.frame(MessageData::Binary(payload.to_vec()), Some(Opcode::Pong), None)
    }

    pub fn close(&mut self, reason: Option<&str>, code: Option<u16>) -> Result<bool, DriverError> {
        self.session.close(reason, code)
    }

    /// Sends `data` as one frame; `opcode` defaults to text or binary by the
    /// data's type, and `code` is prepended big-endian (for close frames).
    pub fn frame(
        &mut self,
        data: MessageData,
        opcode: Option<Opcode>,
        code: Option<u16>,
    ) -> Result<bool, DriverError> {
        self.session.frame(data, opcode, code)
    }
}
