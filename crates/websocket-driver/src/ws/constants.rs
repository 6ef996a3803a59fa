//! Wire constants: header bit masks, opcodes and close codes.

pub const FIN: u8 = 0b1000_0000;
pub const MASK: u8 = 0b1000_0000;
pub const RSV1: u8 = 0b0100_0000;
pub const RSV2: u8 = 0b0010_0000;
pub const RSV3: u8 = 0b0001_0000;
pub const OPCODE: u8 = 0b0000_1111;
pub const LENGTH: u8 = 0b0111_1111;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Default ceiling on an accumulated message, in bytes.
pub const MAX_LENGTH: u64 = 0x3ff_ffff;

/// Appended to the client key before hashing to form `Sec-WebSocket-Accept`.
pub const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Frame opcode (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0,
    Text = 1,
    Binary = 2,
    Close = 8,
    Ping = 9,
    Pong = 10,
}

impl Opcode {
    /// Returns `None` for the reserved opcodes 3-7 and 11-15.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Continuation),
            1 => Some(Self::Text),
            2 => Some(Self::Binary),
            8 => Some(Self::Close),
            9 => Some(Self::Ping),
            10 => Some(Self::Pong),
            _ => None,
        }
    }

    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Continuation, text and binary: the opcodes that build messages.
    pub const fn is_message(self) -> bool {
        matches!(self, Self::Continuation | Self::Text | Self::Binary)
    }

    /// Text and binary: the opcodes that start a new message.
    pub const fn is_opening(self) -> bool {
        matches!(self, Self::Text | Self::Binary)
    }
}

/// Close status codes the engine produces and accepts (RFC 6455 §7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    NormalClosure = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    Unacceptable = 1003,
    EncodingError = 1007,
    PolicyViolation = 1008,
    TooLarge = 1009,
    ExtensionError = 1010,
    UnexpectedCondition = 1011,
}

impl CloseCode {
    pub const ALL: [CloseCode; 9] = [
        Self::NormalClosure,
        Self::GoingAway,
        Self::ProtocolError,
        Self::Unacceptable,
        Self::EncodingError,
        Self::PolicyViolation,
        Self::TooLarge,
        Self::ExtensionError,
        Self::UnexpectedCondition,
    ];

    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.code() == code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        code.code()
    }
}

/// Lowest close code reserved for applications and libraries.
pub const MIN_RESERVED_ERROR: u16 = 3000;
/// Highest close code reserved for applications and libraries.
pub const MAX_RESERVED_ERROR: u16 = 4999;

/// Returns true if a peer may legitimately send `code` in a close frame.
pub fn is_acceptable_close_code(code: u16) -> bool {
    CloseCode::from_u16(code).is_some() || (MIN_RESERVED_ERROR..=MAX_RESERVED_ERROR).contains(&code)
}

/// Close code reported when the transport dropped before any close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_classes() {
        assert!(Opcode::Ping.is_control());
        assert!(!Opcode::Text.is_control());
        assert!(Opcode::Continuation.is_message());
        assert!(!Opcode::Continuation.is_opening());
        assert!(Opcode::Binary.is_opening());
        assert_eq!(Opcode::from_u8(3), None);
        assert_eq!(Opcode::from_u8(0x0b), None);
        assert_eq!(Opcode::from_u8(10), Some(Opcode::Pong));
    }

    #[test]
    fn close_code_acceptance() {
        assert!(is_acceptable_close_code(1000));
        assert!(is_acceptable_close_code(1011));
        assert!(is_acceptable_close_code(3000));
        assert!(is_acceptable_close_code(4999));
        assert!(!is_acceptable_close_code(1004));
        assert!(!is_acceptable_close_code(1005));
        assert!(!is_acceptable_close_code(1006));
        assert!(!is_acceptable_close_code(2999));
        assert!(!is_acceptable_close_code(5000));
    }
}
