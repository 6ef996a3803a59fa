//! Server façade that reads the raw upgrade request before picking a
//! protocol variant.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::hybi::PingCallback;
use super::{Driver, ReadyState, Transport};
use crate::env::Env;
use crate::error::{DriverError, ListenerError, ProtocolError};
use crate::event_emitter::EventEmitter;
use crate::events::{CloseEvent, Event, EventKind, MessageData};
use crate::extensions::Extension;
use crate::http::Request;
use crate::options::DriverOptions;
use crate::ws::{CloseCode, Opcode};

/// A call made before the request was complete, replayed on the selected
/// driver.
enum Call {
    SetHeader(String, String),
    AddExtension(Box<dyn Extension>),
    Start,
    Frame(MessageData, Option<Opcode>, Option<u16>),
    Binary(Vec<u8>),
    Ping(Vec<u8>, Option<PingCallback>),
    Pong(Vec<u8>),
    Close(Option<String>, Option<u16>),
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SetHeader(..) => "SetHeader",
            Self::AddExtension(_) => "AddExtension",
            Self::Start => "Start",
            Self::Frame(..) => "Frame",
            Self::Binary(_) => "Binary",
            Self::Ping(..) => "Ping",
            Self::Pong(_) => "Pong",
            Self::Close(..) => "Close",
        };
        f.write_str(name)
    }
}

/// Server-side connection that parses the HTTP upgrade request itself.
///
/// Calls made before the request is complete are queued and replayed, in
/// order, on the driver [`Driver::rack`] selects for it. Listeners added
/// before that point carry over to the selected driver.
pub struct Server {
    socket: Option<Box<dyn Transport>>,
    emitter: EventEmitter<Event>,
    options: DriverOptions,
    http: Request,
    env: Option<Env>,
    delegate: Option<Driver>,
    calls: VecDeque<Call>,
    ready_state: ReadyState,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("emitter", &self.emitter)
            .field("env", &self.env)
            .field("delegate", &self.delegate)
            .field("calls", &self.calls)
            .field("ready_state", &self.ready_state)
            .finish_non_exhaustive()
    }
}

impl Server {
    pub fn new(socket: impl Transport + 'static, options: DriverOptions) -> Self {
        Self {
            socket: Some(Box::new(socket)),
            emitter: EventEmitter::new(),
            options,
            http: Request::new(),
            env: None,
            delegate: None,
            calls: VecDeque::new(),
            ready_state: ReadyState::Connecting,
        }
    }

    /// The protocol driver, once the upgrade request has been parsed.
    pub fn delegate(&self) -> Option<&Driver> {
        self.delegate.as_ref()
    }

    pub fn delegate_mut(&mut self) -> Option<&mut Driver> {
        self.delegate.as_mut()
    }

    /// The parsed upgrade request.
    pub fn env(&self) -> Option<&Env> {
        self.env.as_ref()
    }

    pub fn url(&self) -> Option<String> {
        self.env.as_ref().map(Env::url)
    }

    fn emitter_mut(&mut self) -> &mut EventEmitter<Event> {
        match &mut self.delegate {
            Some(delegate) => delegate.emitter_mut(),
            None => &mut self.emitter,
        }
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> u64
    where
        F: FnMut(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.emitter_mut().on(kind, listener)
    }

    pub fn remove_listener(&mut self, kind: EventKind, listener_id: u64) -> bool {
        self.emitter_mut().remove_listener(kind, listener_id)
    }

    pub fn state(&self) -> ReadyState {
        match &self.delegate {
            Some(delegate) => delegate.state(),
            None => self.ready_state,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.delegate.as_ref().map(Driver::version)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.delegate.as_ref().and_then(Driver::protocol)
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
        if let Some(delegate) = &mut self.delegate {
            return delegate.parse(data);
        }
        if self.ready_state == ReadyState::Closed {
            return Ok(());
        }

        self.http.parse(data);
        if self.http.is_error() {
            return self.fail_request("Invalid HTTP request");
        }
        if !self.http.is_complete() {
            return Ok(());
        }
        let (Some(env), Some(socket)) = (self.http.env(), self.socket.take()) else {
            return self.fail_request("Invalid HTTP request");
        };

        let mut delegate = Driver::rack_boxed(env.clone(), socket, self.options.clone());
        debug!(version = %delegate.version(), url = %env.url(), "upgrade request parsed");
        *delegate.emitter_mut() = std::mem::take(&mut self.emitter);
        self.env = Some(env);
        let connected = delegate.emitter_mut().emit(&Event::Connect);
        self.delegate = Some(delegate);
        connected.and(self.replay())
    }

    fn replay(&mut self) -> Result<(), DriverError> {
        let Some(delegate) = self.delegate.as_mut() else {
            return Ok(());
        };
        let mut result = Ok(());
        while let Some(call) = self.calls.pop_front() {
            let outcome = match call {
                Call::SetHeader(name, value) => {
                    delegate.set_header(&name, &value);
                    Ok(true)
                }
                Call::AddExtension(extension) => Ok(delegate.add_extension(extension)),
                Call::Start => delegate.start(),
                Call::Frame(data, opcode, code) => delegate.frame(data, opcode, code),
                Call::Binary(bytes) => delegate.binary(&bytes),
                Call::Ping(payload, None) => delegate.ping(&payload),
                Call::Ping(payload, Some(callback)) => delegate.ping_with_callback(&payload, callback),
                Call::Pong(payload) => delegate.pong(&payload),
                Call::Close(reason, code) => delegate.close(reason.as_deref(), code),
            };
            result = result.and(outcome.map(|_| ()));
        }
        result
    }

    fn fail_request(&mut self, message: &str) -> Result<(), DriverError> {
        warn!(reason = message, "invalid upgrade request");
        self.ready_state = ReadyState::Closed;
        let errored = self.emitter.emit(&Event::Error(ProtocolError::new(message)));
        let closed = self.emitter.emit(&Event::Close(CloseEvent::new(
            CloseCode::ProtocolError.code(),
            message,
        )));
        errored.and(closed)
    }

    fn defer(&mut self, call: Call) -> bool {
        self.calls.push_back(call);
        true
    }

    pub fn add_extension(&mut self, extension: Box<dyn Extension>) -> bool {
        match &mut self.delegate {
            Some(delegate) => delegate.add_extension(extension),
            None => self.defer(Call::AddExtension(extension)),
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match &mut self.delegate {
            Some(delegate) => delegate.set_header(name, value),
            None => self.defer(Call::SetHeader(name.to_string(), value.to_string())),
        }
    }

    pub fn start(&mut self) -> Result<bool, DriverError> {
        match &mut self.delegate {
            Some(delegate) => delegate.start(),
            None => Ok(self.defer(Call::Start)),
        }
    }

    pub fn text(&mut self, message: &str) -> Result<bool, DriverError> {
        self.frame(MessageData::Text(message.to_string()), None, None)
    }

    pub fn binary(&mut self, message: &[u8]) -> Result<bool, DriverError> {
        match &mut self.delegate {
            Some(delegate) => delegate.binary(message),
            None => Ok(self.defer(Call::Binary(message.to_vec()))),
        }
    }

    pub fn ping(&mut self, payload: &[u8]) -> Result<bool, DriverError> {
        match &mut self.delegate {
            Some(delegate) => delegate.ping(payload),
            None => Ok(self.defer(Call::Ping(payload.to_vec(), None))),
        }
    }

    pub fn ping_with_callback<F>(&mut self, payload: &[u8], callback: F) -> Result<bool, DriverError>
    where
        F: FnOnce() + Send + 'static,
    {
        match &mut self.delegate {
            Some(delegate) => delegate.ping_with_callback(payload, callback),
            None => Ok(self.defer(Call::Ping(payload.to_vec(), Some(Box::new(callback))))),
        }
    }

    pub fn pong(&mut self, payload: &[u8]) -> Result<bool, DriverError> {
        match &mut self.delegate {
            Some(delegate) => delegate.pong(payload),
            None => Ok(self.defer(Call::Pong(payload.to_vec()))),
        }
    }

    pub fn close(&mut self, reason: Option<&str>, code: Option<u16>) -> Result<bool, DriverError> {
        match &mut self.delegate {
            Some(delegate) => delegate.close(reason, code),
            None => Ok(self.defer(Call::Close(reason.map(str::to_string), code))),
        }
    }

    pub fn frame(
        &mut self,
        data: MessageData,
        opcode: Option<Opcode>,
        code: Option<u16>,
    ) -> Result<bool, DriverError> {
        match &mut self.delegate {
            Some(delegate) => delegate.frame(data, opcode, code),
            None => Ok(self.defer(Call::Frame(data, opcode, code))),
        }
    }
}
