//! The hixie-75 server driver.

use tracing::debug;

use super::base::Base;
use super::hixie::Hixie;
use super::{ReadyState, Transport};
use crate::env::Env;
use crate::error::DriverError;
use crate::events::MessageData;
use crate::headers::Headers;
use crate::options::DriverOptions;
use crate::ws::Opcode;

#[derive(Debug)]
pub struct Draft75 {
    pub(crate) hixie: Hixie,
    env: Env,
}

impl Draft75 {
    pub fn new(env: Env, socket: impl Transport + 'static, options: DriverOptions) -> Self {
        Self::boxed(env, Box::new(socket), options)
    }

    pub(crate) fn boxed(env: Env, socket: Box<dyn Transport>, options: DriverOptions) -> Self {
        let base = Base::new(socket, options, ReadyState::Connecting, "hixie-75");
        Self {
            hixie: Hixie::new(base, false),
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
        let mut headers = Headers::new();
        headers.set("Upgrade", "WebSocket");
        headers.set("Connection", "Upgrade");
        headers.set("WebSocket-Origin", self.env.header("Origin").unwrap_or(""));
        headers.set("WebSocket-Location", &self.env.url());
        headers.extend(&self.hixie.base.headers);
        format!("HTTP/1.1 101 Web Socket Protocol Handshake\r\n{headers}\r\n")
    }

    pub fn start(&mut self) -> Result<bool, DriverError> {
        if self.hixie.base.ready_state != ReadyState::Connecting {
            return Ok(false);
        }
        let response = self.handshake_response();
        self.hixie.base.write(response.as_bytes());
        debug!(version = "hixie-75", "handshake response sent");
        self.hixie.open()?;
        Ok(true)
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
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
