//! Driver configuration.

use serde::{Deserialize, Serialize};

use crate::ws::constants::MAX_LENGTH;

/// Options shared by every driver variant.
///
/// Deserializes with defaults for missing fields, so it can be embedded in a
/// host application's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Largest message, in bytes, the parser will assemble.
    pub max_length: u64,
    /// Mask outgoing frames. Clients always mask.
    pub masking: bool,
    /// Reject unmasked incoming frames. Servers always require masking.
    pub require_masking: bool,
    /// Subprotocols, most preferred first.
    pub protocols: Vec<String>,
    /// HTTP proxy a client tunnels through with `CONNECT`.
    pub proxy: Option<String>,
    /// Cap on bytes buffered by the frame parser.
    pub max_buffer_size: Option<usize>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_length: MAX_LENGTH,
            masking: false,
            require_masking: false,
            protocols: Vec::new(),
            proxy: None,
            max_buffer_size: None,
        }
    }
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_length(mut self, max_length: u64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_masking(mut self, masking: bool) -> Self {
        self.masking = masking;
        self
    }

    pub fn with_require_masking(mut self, require_masking: bool) -> Self {
        self.require_masking = require_masking;
        self
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = Some(max_buffer_size);
        self
    }
}
