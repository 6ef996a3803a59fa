//! Incremental frame parser (RFC 6455 §5).
//!
//! Bytes are pushed into a [`StreamReader`] and consumed one header field at
//! a time. Whenever a field is incomplete the parser returns and resumes from
//! the same stage on the next call, so frames may be split across any number
//! of reads.

use tracing::trace;
use websocket_driver_buffers::StreamReader;

use super::constants::{
    is_acceptable_close_code, CloseCode, Opcode, FIN, LENGTH, MASK, MAX_CONTROL_PAYLOAD,
    MAX_LENGTH, OPCODE, RSV1, RSV2, RSV3,
};
use super::frames::{Frame, Message};
use crate::error::DriverError;
use crate::mask::apply_mask;
use crate::utf8;

/// Receives the decoded output of a [`FrameParser`].
///
/// Every callback may fail only because a caller-supplied listener failed.
/// The parser stops at that point and keeps any unconsumed bytes buffered.
pub trait FrameHandler {
    /// Returns true if the frame's RSV bits are claimed by an active
    /// extension (or are all clear).
    fn valid_frame_rsv(&self, frame: &Frame) -> bool;

    fn handle_message(&mut self, message: Message) -> Result<(), DriverError>;

    /// Called with a validated close code and reason.
    fn handle_close(&mut self, code: u16, reason: String) -> Result<(), DriverError>;

    fn handle_ping(&mut self, payload: Vec<u8>) -> Result<(), DriverError>;

    fn handle_pong(&mut self, payload: Vec<u8>) -> Result<(), DriverError>;

    /// Called once when the stream violates the protocol; parsing halts.
    fn handle_error(&mut self, code: CloseCode, message: String) -> Result<(), DriverError>;

    /// True once the connection is closed; the parser halts when it sees it.
    fn is_closed(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Opcode,
    Length,
    ExtendedLength(usize),
    MaskingKey,
    Payload,
    Halted,
}

/// Pending frame header fields, filled in as bytes arrive.
#[derive(Debug, Clone, Copy)]
struct Header {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: Opcode,
    masked: bool,
    masking_key: Option<[u8; 4]>,
    length: u64,
}

/// Streaming frame parser.
#[derive(Debug)]
pub struct FrameParser {
    reader: StreamReader,
    stage: Stage,
    header: Option<Header>,
    message: Option<Message>,
    max_length: u64,
    require_masking: bool,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            reader: StreamReader::new(),
            stage: Stage::Opcode,
            header: None,
            message: None,
            max_length: MAX_LENGTH,
            require_masking: false,
        }
    }

    /// Sets the ceiling on an accumulated message, in bytes.
    pub fn with_max_length(mut self, max_length: u64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Rejects unmasked frames with close code 1003.
    pub fn with_require_masking(mut self, require_masking: bool) -> Self {
        self.require_masking = require_masking;
        self
    }

    /// Caps the number of unread bytes the parser will buffer.
    pub fn with_buffer_limit(mut self, limit: Option<usize>) -> Self {
        self.reader = match limit {
            Some(limit) => StreamReader::with_capacity_limit(limit),
            None => StreamReader::new(),
        };
        self
    }

    /// True once a protocol error or close frame has stopped the parser.
    pub fn is_halted(&self) -> bool {
        self.stage == Stage::Halted
    }

    /// True while a fragmented message is being assembled.
    pub fn has_pending_message(&self) -> bool {
        self.message.is_some()
    }

    /// Stops parsing and drops all buffered state.
    pub fn halt(&mut self) {
        self.stage = Stage::Halted;
        self.header = None;
        self.message = None;
        self.reader.clear();
    }

    /// Feeds `data` into the parser and dispatches every complete frame.
    pub fn parse<H: FrameHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<(), DriverError> {
        if self.stage == Stage::Halted {
            return Ok(());
        }
        if let Err(err) = self.reader.push(data.to_vec()) {
            return self.fail(handler, CloseCode::TooLarge, err.to_string());
        }
        loop {
            if handler.is_closed() {
                self.halt();
                return Ok(());
            }
            match self.stage {
                Stage::Opcode => {
                    let Some(octet) = self.reader.read_u8() else {
                        return Ok(());
                    };
                    self.parse_opcode(octet, handler)?;
                }
                Stage::Length => {
                    let Some(octet) = self.reader.read_u8() else {
                        return Ok(());
                    };
                    self.parse_length(octet, handler)?;
                }
                Stage::ExtendedLength(size) => {
                    let Some(bytes) = self.reader.read(size) else {
                        return Ok(());
                    };
                    self.parse_extended_length(&bytes, handler)?;
                }
                Stage::MaskingKey => {
                    let Some(bytes) = self.reader.read(4) else {
                        return Ok(());
                    };
                    if let Some(header) = self.header.as_mut() {
                        header.masking_key = Some([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    }
                    self.stage = Stage::Payload;
                }
                Stage::Payload => {
                    let length = self.header.map(|h| h.length).unwrap_or(0);
                    let Ok(length) = usize::try_from(length) else {
                        return self.fail(
                            handler,
                            CloseCode::TooLarge,
                            "WebSocket frame length too large".to_string(),
                        );
                    };
                    let Some(payload) = self.reader.read(length) else {
                        return Ok(());
                    };
                    self.stage = Stage::Opcode;
                    self.emit_frame(payload, handler)?;
                }
                Stage::Halted => return Ok(()),
            }
        }
    }

    fn fail<H: FrameHandler>(
        &mut self,
        handler: &mut H,
        code: CloseCode,
        message: String,
    ) -> Result<(), DriverError> {
        self.halt();
        handler.handle_error(code, message)
    }

    fn parse_opcode<H: FrameHandler>(&mut self, octet: u8, handler: &mut H) -> Result<(), DriverError> {
        let fin = octet & FIN == FIN;
        let rsv1 = octet & RSV1 == RSV1;
        let rsv2 = octet & RSV2 == RSV2;
        let rsv3 = octet & RSV3 == RSV3;
        let code = octet & OPCODE;

        let Some(opcode) = Opcode::from_u8(code) else {
            if rsv1 || rsv2 || rsv3 {
                return self.fail(handler, CloseCode::ProtocolError, rsv_message(rsv1, rsv2, rsv3));
            }
            return self.fail(
                handler,
                CloseCode::ProtocolError,
                format!("Unrecognized frame opcode: {code}"),
            );
        };

        let header = Header {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            masked: false,
            masking_key: None,
            length: 0,
        };

        let rsv_frame = Frame::new(opcode, Vec::new())
            .with_fin(fin)
            .with_rsv(rsv1, rsv2, rsv3);
        if !handler.valid_frame_rsv(&rsv_frame) {
            return self.fail(handler, CloseCode::ProtocolError, rsv_message(rsv1, rsv2, rsv3));
        }
        if opcode.is_control() && !fin {
            return self.fail(
                handler,
                CloseCode::ProtocolError,
                format!("Received fragmented control frame: opcode = {code}"),
            );
        }
        if self.message.is_some() && opcode.is_opening() {
            return self.fail(
                handler,
                CloseCode::ProtocolError,
                "Received new data frame but previous continuous frame is unfinished".to_string(),
            );
        }

        self.header = Some(header);
        self.stage = Stage::Length;
        Ok(())
    }

    fn parse_length<H: FrameHandler>(&mut self, octet: u8, handler: &mut H) -> Result<(), DriverError> {
        let masked = octet & MASK == MASK;
        if self.require_masking && !masked {
            return self.fail(
                handler,
                CloseCode::Unacceptable,
                "Received unmasked frame but masking is required".to_string(),
            );
        }
        let length = u64::from(octet & LENGTH);
        let Some(header) = self.header.as_mut() else {
            return Ok(());
        };
        header.masked = masked;
        header.length = length;

        match length {
            126 => self.stage = Stage::ExtendedLength(2),
            127 => self.stage = Stage::ExtendedLength(8),
            _ => {
                if !self.check_frame_length(handler)? {
                    return Ok(());
                }
                self.stage = if masked { Stage::MaskingKey } else { Stage::Payload };
            }
        }
        Ok(())
    }

    fn parse_extended_length<H: FrameHandler>(
        &mut self,
        bytes: &[u8],
        handler: &mut H,
    ) -> Result<(), DriverError> {
        let length = bytes
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        let Some(header) = self.header.as_mut() else {
            return Ok(());
        };
        header.length = length;
        let (opcode, masked) = (header.opcode, header.masked);

        if opcode.is_control() && length > MAX_CONTROL_PAYLOAD {
            return self.fail(
                handler,
                CloseCode::ProtocolError,
                format!("Received control frame having too long payload: {length}"),
            );
        }
        if !self.check_frame_length(handler)? {
            return Ok(());
        }
        self.stage = if masked { Stage::MaskingKey } else { Stage::Payload };
        Ok(())
    }

    /// Returns `Ok(false)` if the frame would push the message past the
    /// configured maximum; the parser has then already failed.
    fn check_frame_length<H: FrameHandler>(&mut self, handler: &mut H) -> Result<bool, DriverError> {
        let buffered = self.message.as_ref().map_or(0, |m| m.len() as u64);
        let length = self.header.map_or(0, |h| h.length);
        match buffered.checked_add(length) {
            Some(total) if total <= self.max_length => Ok(true),
            _ => {
                self.fail(
                    handler,
                    CloseCode::TooLarge,
                    "WebSocket frame length too large".to_string(),
                )?;
                Ok(false)
            }
        }
    }

    fn emit_frame<H: FrameHandler>(&mut self, mut payload: Vec<u8>, handler: &mut H) -> Result<(), DriverError> {
        let Some(header) = self.header.take() else {
            return Ok(());
        };
        if let Some(key) = header.masking_key {
            apply_mask(&mut payload, key);
        }
        trace!(
            opcode = header.opcode as u8,
            length = header.length,
            masked = header.masked,
            "frame decoded"
        );
        let frame = Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            masked: header.masked,
            masking_key: header.masking_key,
            length: header.length,
            payload,
        };

        match frame.opcode {
            Opcode::Continuation => {
                let Some(message) = self.message.as_mut() else {
                    return self.fail(
                        handler,
                        CloseCode::ProtocolError,
                        "Received unexpected continuation frame".to_string(),
                    );
                };
                let fin = frame.fin;
                message.push(frame);
                if fin {
                    if let Some(message) = self.message.take() {
                        return handler.handle_message(message);
                    }
                }
                Ok(())
            }
            Opcode::Text | Opcode::Binary => {
                let fin = frame.fin;
                let message = Message::from_frame(frame);
                if fin {
                    handler.handle_message(message)
                } else {
                    self.message = Some(message);
                    Ok(())
                }
            }
            Opcode::Close => {
                let (code, reason) = parse_close_payload(&frame.payload);
                self.halt();
                handler.handle_close(code, reason)
            }
            Opcode::Ping => handler.handle_ping(frame.payload),
            Opcode::Pong => handler.handle_pong(frame.payload),
        }
    }
}

fn rsv_message(rsv1: bool, rsv2: bool, rsv3: bool) -> String {
    format!(
        "One or more reserved bits are on: reserved1 = {}, reserved2 = {}, reserved3 = {}",
        u8::from(rsv1),
        u8::from(rsv2),
        u8::from(rsv3)
    )
}

/// Extracts the close code and reason, substituting 1002 for anything a
/// peer may not send.
///
/// An empty payload means a normal closure. A one-byte payload, an
/// unrecognized code, an oversized payload or a reason that is not UTF-8
/// all become a protocol error.
pub fn parse_close_payload(payload: &[u8]) -> (u16, String) {
    let protocol_error = CloseCode::ProtocolError.code();
    if payload.is_empty() {
        return (CloseCode::NormalClosure.code(), String::new());
    }
    if payload.len() < 2 {
        return (protocol_error, String::new());
    }
    let mut code = u16::from_be_bytes([payload[0], payload[1]]);
    if !is_acceptable_close_code(code) {
        code = protocol_error;
    }
    if !utf8::is_valid(&payload[2..]) {
        return (protocol_error, String::new());
    }
    let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
    if payload.len() as u64 > MAX_CONTROL_PAYLOAD {
        code = protocol_error;
    }
    (code, reason)
}
