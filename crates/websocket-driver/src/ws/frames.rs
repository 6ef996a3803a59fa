//! Frame and message structs.

use super::constants::Opcode;

/// One wire-level WebSocket frame (RFC 6455 §5.2).
///
/// The parser fills a `Frame` field by field as header bytes arrive; the
/// payload is attached last, already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub masking_key: Option<[u8; 4]>,
    pub length: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A final, unmasked frame without reserved bits carrying `payload`.
    pub fn new(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            masked: false,
            masking_key: None,
            length: payload.len() as u64,
            payload,
        }
    }

    pub fn with_masking_key(mut self, key: [u8; 4]) -> Self {
        self.masked = true;
        self.masking_key = Some(key);
        self
    }

    pub fn with_rsv(mut self, rsv1: bool, rsv2: bool, rsv3: bool) -> Self {
        self.rsv1 = rsv1;
        self.rsv2 = rsv2;
        self.rsv3 = rsv3;
        self
    }

    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }
}

/// An application-level message: one or more frames joined together.
///
/// `opcode` and the RSV bits come from the first frame. Extensions may
/// rewrite `data` and the RSV bits on the way in and out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub opcode: Opcode,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub data: Vec<u8>,
    /// Number of frames folded into this message so far.
    pub frames: usize,
}

impl Message {
    pub fn new(opcode: Opcode, data: Vec<u8>) -> Self {
        Self {
            opcode,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            data,
            frames: 0,
        }
    }

    /// Starts a message from its opening frame.
    pub fn from_frame(frame: Frame) -> Self {
        Self {
            opcode: frame.opcode,
            rsv1: frame.rsv1,
            rsv2: frame.rsv2,
            rsv3: frame.rsv3,
            data: frame.payload,
            frames: 1,
        }
    }

    /// Appends a continuation frame's payload.
    pub fn push(&mut self, frame: Frame) {
        self.data.extend_from_slice(&frame.payload);
        self.frames += 1;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
