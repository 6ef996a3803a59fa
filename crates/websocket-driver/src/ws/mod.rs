//! RFC 6455 framing: constants, frame structs, the encoder and the
//! incremental parser.

pub mod constants;
pub mod encoder;
pub mod frames;
pub mod parser;

pub use constants::{CloseCode, Opcode};
pub use encoder::FrameEncoder;
pub use frames::{Frame, Message};
pub use parser::{parse_close_payload, FrameHandler, FrameParser};
