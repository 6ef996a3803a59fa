//! Error types.

use crate::ws::CloseCode;

/// What a listener returns when it cannot handle an event.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned from driver entry points.
///
/// Protocol violations never surface here; they become `error` and `close`
/// events. The only failure an entry point reports is the first error a
/// listener returned while the call was dispatching events.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("event listener failed: {0}")]
    Listener(#[source] ListenerError),
}

/// Payload of the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub message: String,
    /// Close code the connection was (or will be) closed with.
    pub code: Option<CloseCode>,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: CloseCode) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// Failure to interpret a target or proxy URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("{0} is not a valid WebSocket URL: {1}")]
    Parse(String, url::ParseError),
    #[error("{0} is not a valid WebSocket URL: unsupported scheme")]
    UnsupportedScheme(String),
    #[error("{0} is not a valid WebSocket URL: missing host")]
    MissingHost(String),
}

/// Raised by extensions and by the `Sec-WebSocket-Extensions` codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExtensionError {
    pub message: String,
}

impl ExtensionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
