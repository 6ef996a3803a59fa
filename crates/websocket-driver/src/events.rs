//! Events surfaced to callers.

use crate::error::ProtocolError;
use crate::event_emitter::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// A proxy tunnel was established, or a server parsed the upgrade request.
    Connect,
    Open,
    Message,
    Error,
    Close,
}

/// Data carried by a `message` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageData {
    Text(String),
    Binary(Vec<u8>),
}

impl MessageData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<&str> for MessageData {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for MessageData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for MessageData {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
}

impl CloseEvent {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Open,
    Message(MessageData),
    Error(ProtocolError),
    Close(CloseEvent),
}

impl EventType for Event {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::Connect => EventKind::Connect,
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
            Self::Close(_) => EventKind::Close,
        }
    }
}
