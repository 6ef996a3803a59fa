//! State shared by every protocol variant.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::{ReadyState, Transport};
use crate::error::{DriverError, ProtocolError};
use crate::event_emitter::EventEmitter;
use crate::events::{CloseEvent, Event, MessageData};
use crate::headers::Headers;
use crate::options::DriverOptions;
use crate::ws::Opcode;

/// An outgoing frame requested before the connection opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueuedFrame {
    pub data: MessageData,
    pub opcode: Option<Opcode>,
    pub code: Option<u16>,
}

pub(crate) struct Base {
    pub socket: Box<dyn Transport>,
    pub emitter: EventEmitter<Event>,
    pub ready_state: ReadyState,
    /// Custom handshake headers added with `set_header`.
    pub headers: Headers,
    pub queue: VecDeque<QueuedFrame>,
    pub options: DriverOptions,
    pub version: String,
}

impl std::fmt::Debug for Base {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Base")
            .field("emitter", &self.emitter)
            .field("ready_state", &self.ready_state)
            .field("queue", &self.queue.len())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Base {
    pub fn new(
        socket: Box<dyn Transport>,
        options: DriverOptions,
        ready_state: ReadyState,
        version: impl Into<String>,
    ) -> Self {
        Self {
            socket,
            emitter: EventEmitter::new(),
            ready_state,
            headers: Headers::new(),
            queue: VecDeque::new(),
            options,
            version: version.into(),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.socket.write(bytes);
    }

    pub fn emit(&mut self, event: Event) -> Result<(), DriverError> {
        self.emitter.emit(&event)
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        if self.ready_state > ReadyState::Connecting {
            return false;
        }
        if !value.trim().is_empty() {
            self.headers.set(name, value);
        }
        true
    }

    pub fn enqueue(&mut self, data: MessageData, opcode: Option<Opcode>, code: Option<u16>) -> bool {
        trace!(version = %self.version, "frame queued until open");
        self.queue.push_back(QueuedFrame { data, opcode, code });
        true
    }

    pub fn set_state(&mut self, state: ReadyState) {
        if self.ready_state != state {
            debug!(version = %self.version, from = ?self.ready_state, to = ?state, "ready state changed");
        }
        self.ready_state = state;
    }

    /// Moves to CLOSED and emits `close`, unless already closed.
    pub fn finalize(&mut self, code: u16, reason: &str) -> Result<(), DriverError> {
        if self.ready_state == ReadyState::Closed {
            return Ok(());
        }
        self.set_state(ReadyState::Closed);
        self.emit(Event::Close(CloseEvent::new(code, reason)))
    }

    /// Emits `error` followed by `close` without any closing handshake.
    pub fn fail_locally(&mut self, code: u16, message: &str) -> Result<(), DriverError> {
        let errored = self.emit(Event::Error(ProtocolError::new(message)));
        self.set_state(ReadyState::Closed);
        let closed = self.emit(Event::Close(CloseEvent::new(code, message)));
        errored.and(closed)
    }
}
