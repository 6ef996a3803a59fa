//! The hixie-76 server driver.
//!
//! The handshake completes in two steps: the header response goes out on
//! `start`, and the MD5 signature follows once the 8-byte request body has
//! arrived, either with the request or through `parse`.

use md5::{Digest, Md5};
use tracing::{debug, warn};

use super::base::Base;
use super::hixie::Hixie;
use super::{ReadyState, Transport};
use crate::env::Env;
use crate::error::{DriverError, ProtocolError};
use crate::events::{Event, MessageData};
use crate::options::DriverOptions;
use crate::ws::Opcode;

const BODY_SIZE: usize = 8;
const INVALID_KEYS: &str = "Client sent invalid Sec-WebSocket-Key headers";

/// Numeric value of a `Sec-WebSocket-Key1`/`Key2` header: its digits divided
/// by its space count. `None` unless the division is exact and fits in 32
/// bits.
pub fn key_value(key: &str) -> Option<u32> {
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    let spaces = key.chars().filter(|&c| c == ' ').count() as u64;
    let number: u64 = digits.parse().ok()?;
    if spaces == 0 || number % spaces != 0 {
        return None;
    }
    u32::try_from(number / spaces).ok()
}

/// The 16-byte handshake signature.
pub fn signature(key1: u32, key2: u32, body: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(key1.to_be_bytes());
    hasher.update(key2.to_be_bytes());
    hasher.update(body);
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[derive(Debug)]
pub struct Draft76 {
    pub(crate) hixie: Hixie,
    env: Env,
    keys: Option<(u32, u32)>,
    body: Vec<u8>,
    awaiting_body: bool,
    started: bool,
}

impl Draft76 {
    pub fn new(env: Env, socket: impl Transport + 'static, options: DriverOptions) -> Self {
        Self::boxed(env, Box::new(socket), options)
    }

    pub(crate) fn boxed(env: Env, socket: Box<dyn Transport>, options: DriverOptions) -> Self {
        let base = Base::new(socket, options, ReadyState::Connecting, "hixie-76");
        let key = |name| env.header(name).and_then(key_value);
        let keys = key("Sec-WebSocket-Key1").zip(key("Sec-WebSocket-Key2"));
        Self {
            hixie: Hixie::new(base, true),
            keys,
            body: env.body.clone(),
            awaiting_body: true,
            started: false,
            env,
        }
    }

    pub fn version(&self) -> &str {
        &self.hixie.base.version
    }

    pub fn ready_state(&self) -> ReadyState {
        self.hixie.base.ready_state
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        self.hixie.base.set_header(name, value)
    }

    fn handshake_response(&self) -> String {
        format!(
            "HTTP/1.1 101 WebSocket Protocol Handshake\r\n\
             Upgrade: WebSocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Origin: {}\r\n\
             Sec-WebSocket-Location: {}\r\n\
             {}\r\n",
            self.env.header("Origin").unwrap_or(""),
            self.env.url(),
            self.hixie.base.headers,
        )
    }

    pub fn start(&mut self) -> Result<bool, DriverError> {
        if self.hixie.base.ready_state != ReadyState::Connecting {
            return Ok(false);
        }
        if self.keys.is_none() {
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{INVALID_KEYS}",
                INVALID_KEYS.len()
            );
            self.hixie.base.write(response.as_bytes());
            warn!(version = "hixie-76", reason = INVALID_KEYS, "handshake failed");
            let errored = self.hixie.base.emit(Event::Error(ProtocolError::new(INVALID_KEYS)));
            let closed = self.hixie.base.finalize(1000, "");
            errored.and(closed)?;
            return Ok(true);
        }
        let response = self.handshake_response();
        self.hixie.base.write(response.as_bytes());
        self.started = true;
        self.send_handshake_body()?;
        Ok(true)
    }

    fn send_handshake_body(&mut self) -> Result<(), DriverError> {
        if !self.started || !self.awaiting_body || self.body.len() < BODY_SIZE {
            return Ok(());
        }
        let Some((key1, key2)) = self.keys else {
            return Ok(());
        };
        let body = std::mem::take(&mut self.body);
        let (head, rest) = body.split_at(BODY_SIZE);
        self.hixie.base.write(&signature(key1, key2, head));
        self.awaiting_body = false;
        debug!(version = "hixie-76", "handshake signature sent");
        let opened = self.hixie.open();
        opened.and(self.hixie.parse(rest))
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
        if self.awaiting_body {
            if self.hixie.base.ready_state == ReadyState::Closed {
                return Ok(());
            }
            self.body.extend_from_slice(data);
            return self.send_handshake_body();
        }
        self.hixie.parse(data)
    }

    pub fn text(&mut self, message: &str) -> Result<bool, DriverError> {
        self.frame(MessageData::Text(message.to_string()), None, None)
    }

    pub fn frame(
        &mut self,
        data: MessageData,
        opcode: Option<Opcode>,
        code: Option<u16>,
    ) -> Result<bool, DriverError> {
        self.hixie.frame(data, opcode, code)
    }

    pub fn close(&mut self) -> Result<bool, DriverError> {
        self.hixie.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_values() {
        assert_eq!(key_value("1   38 wZ3f9 23O0 3l 0r"), Some(197_703_290));
        assert_eq!(key_value("27   0E 6 2  1665:< ;U 1H"), Some(300_690_739));
        assert_eq!(key_value("2 L785 8o% s9Sy9@V. 4<1P5"), None);
        assert_eq!(key_value("12345"), None);
        assert_eq!(key_value("   "), None);
    }

    #[test]
    fn signature_matches_known_handshake() {
        let body = [0x91, 0x25, 0x3e, 0xd3, 0xa9, 0xe7, 0x6a, 0x88];
        let expected = [
            0xb4, 0x9c, 0x6e, 0x40, 0x53, 0x04, 0x04, 0x26, 0xe5, 0x1b, 0xbf, 0x6c, 0xb7, 0x9f,
            0x1d, 0xf9,
        ];
        assert_eq!(signature(197_703_290, 300_690_739, &body), expected);
    }
}
