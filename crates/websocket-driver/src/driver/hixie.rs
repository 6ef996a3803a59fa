//! Framing shared by the hixie-75 and hixie-76 drafts.
//!
//! Text frames are `0x00 <utf8> 0xFF`. A leading byte with the high bit set
//! starts a length-prefixed frame whose payload is skipped. Hixie-76 adds a
//! `0xFF 0x00` closing frame.

use tracing::{debug, warn};

use super::base::Base;
use super::ReadyState;
use crate::error::{DriverError, ProtocolError};
use crate::events::{Event, MessageData};
use crate::utf8;
use crate::ws::Opcode;

const FRAME_START: u8 = 0x00;
const FRAME_END: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Leading,
    Length,
    Skip,
    Data,
}

#[derive(Debug)]
pub(crate) struct Hixie {
    pub base: Base,
    stage: Stage,
    length: u64,
    skipped: u64,
    buffer: Vec<u8>,
    /// A leading 0xFF was read (hixie-76 only).
    closing: bool,
    closing_frames: bool,
}

impl Hixie {
    pub fn new(base: Base, closing_frames: bool) -> Self {
        Self {
            base,
            stage: Stage::Leading,
            length: 0,
            skipped: 0,
            buffer: Vec::new(),
            closing: false,
            closing_frames,
        }
    }

    pub fn open(&mut self) -> Result<(), DriverError> {
        self.base.set_state(ReadyState::Open);
        let mut result = Ok(());
        while let Some(queued) = self.base.queue.pop_front() {
            result = result.and(self.frame(queued.data, queued.opcode, queued.code).map(|_| ()));
        }
        debug!(version = %self.base.version, "handshake complete");
        result.and(self.base.emit(Event::Open))
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let mut result = Ok(());
        for &byte in data {
            if self.base.ready_state > ReadyState::Open {
                break;
            }
            result = result.and(self.parse_byte(byte));
        }
        result
    }

    fn parse_byte(&mut self, byte: u8) -> Result<(), DriverError> {
        match self.stage {
            Stage::Leading => {
                if self.closing_frames && byte == FRAME_END {
                    self.closing = true;
                    self.length = 0;
                    self.stage = Stage::Length;
                } else if byte & 0x80 == 0x80 {
                    self.length = 0;
                    self.stage = Stage::Length;
                } else {
                    self.buffer.clear();
                    self.stage = Stage::Data;
                }
            }
            Stage::Length => {
                let length = self
                    .length
                    .checked_mul(128)
                    .and_then(|n| n.checked_add(u64::from(byte & 0x7f)));
                let Some(length) = length.filter(|&n| n <= self.base.options.max_length) else {
                    return self.close().map(|_| ());
                };
                self.length = length;
                if self.closing && length == 0 {
                    return self.close().map(|_| ());
                }
                if byte & 0x80 != 0x80 {
                    if length == 0 {
                        self.stage = Stage::Leading;
                    } else {
                        self.skipped = 0;
                        self.stage = Stage::Skip;
                    }
                }
            }
            Stage::Skip => {
                self.skipped += 1;
                if self.skipped == self.length {
                    self.stage = Stage::Leading;
                }
            }
            Stage::Data => {
                if byte == FRAME_END {
                    self.stage = Stage::Leading;
                    let buffer = std::mem::take(&mut self.buffer);
                    return match utf8::decode(buffer) {
                        Some(text) => self.base.emit(Event::Message(MessageData::Text(text))),
                        None => self.fail("Could not decode a text frame as UTF-8"),
                    };
                }
                self.buffer.push(byte);
                if self.buffer.len() as u64 > self.base.options.max_length {
                    return self.close().map(|_| ());
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, message: &str) -> Result<(), DriverError> {
        warn!(version = %self.base.version, reason = %message, "connection failed");
        let errored = self
            .base
            .emit(Event::Error(ProtocolError::new(message)));
        errored.and(self.close().map(|_| ()))
    }

    pub fn frame(
        &mut self,
        data: MessageData,
        opcode: Option<Opcode>,
        code: Option<u16>,
    ) -> Result<bool, DriverError> {
        match self.base.ready_state {
            ReadyState::Connecting => Ok(self.base.enqueue(data, opcode, code)),
            ReadyState::Open => {
                let mut bytes = vec![FRAME_START];
                bytes.extend_from_slice(data.as_bytes());
                bytes.push(FRAME_END);
                self.base.write(&bytes);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn close(&mut self) -> Result<bool, DriverError> {
        if self.base.ready_state == ReadyState::Closed {
            return Ok(false);
        }
        if self.closing_frames && self.base.ready_state == ReadyState::Open {
            self.base.write(&[FRAME_END, FRAME_START]);
        }
        self.base.finalize(1000, "")?;
        Ok(true)
    }
}
